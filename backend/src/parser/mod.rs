//! Tabular ingestion with encoding and delimiter auto-detection.
//!
//! Turns uploaded delimited text into raw [`Record`]s keyed by header.
//! No normalization happens here; values are kept exactly as read.
//!
//! - Short rows yield null for the missing trailing fields.
//! - Values beyond the header width are ignored.
//! - Blank lines are skipped; an empty file yields no records.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::Record;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows
    pub records: Vec<Record>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the specified encoding. Undecodable bytes are replaced.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    decoded.trim_start_matches('\u{feff}').to_string()
}

/// Detect the delimiter by counting occurrences in the header line.
/// Defaults to a comma when no candidate appears.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text with an explicit delimiter.
///
/// # Example
/// ```
/// use ledgerdiff::parser::parse_str;
///
/// let rows = parse_str("id,name\n1,Goku\n2,Gohan", ',').unwrap();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].value("name"), Some("Goku"));
/// ```
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Vec<Record>> {
    parse_with_headers(content, delimiter).map(|(_, records)| records)
}

fn parse_with_headers(content: &str, delimiter: char) -> CsvResult<(Vec<String>, Vec<Record>)> {
    let delimiter = u8::try_from(delimiter).map_err(|_| CsvError::ParseError {
        line: 0,
        message: format!("delimiter '{}' is not a single byte", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() {
        return Ok((headers, Vec::new()));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.as_str(), row.get(i).map(str::to_string)))
            .collect::<Record>();
        records.push(record);
    }

    Ok((headers, records))
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let (headers, records) = parse_with_headers(&content, delimiter)?;

    Ok(ParseResult { records, encoding, delimiter, headers })
}

/// Parse a file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

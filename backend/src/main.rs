//! Ledgerdiff CLI - reconcile two CSV files on a key field
//!
//! # Main Commands
//!
//! ```bash
//! ledgerdiff serve                              # Start HTTP server (port 3000)
//! ledgerdiff reconcile source.csv target.csv   # Print a JSON report
//! ledgerdiff reconcile a.csv b.csv -f html -o report.html
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! ledgerdiff parse input.csv                   # Raw records as JSON
//! ledgerdiff normalize input.csv               # Normalized records as JSON
//! ```

use clap::{Args, Parser, Subcommand};
use ledgerdiff::api::html;
use ledgerdiff::format::{self, OutputKind, Rendered};
use ledgerdiff::{
    normalize_all, parse_file_auto, reconcile_files, CancelToken, DuplicatePolicy,
    InMemoryReportStore, KeylessPolicy, ServerConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ledgerdiff")]
#[command(about = "Reconcile two CSV datasets on a key field", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the reconciliation settings read from the environment.
#[derive(Args, Debug, Default)]
struct PolicyArgs {
    /// Field holding the record key
    #[arg(long)]
    key_field: Option<String>,

    /// Same-side duplicate keys: last-wins or first-wins
    #[arg(long)]
    duplicates: Option<DuplicatePolicy>,

    /// Records without a key: exclude or bucket
    #[arg(long)]
    keyless: Option<KeylessPolicy>,
}

impl PolicyArgs {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(field) = self.key_field {
            config.reconcile.key_field = field;
        }
        if let Some(policy) = self.duplicates {
            config.reconcile.duplicates = policy;
        }
        if let Some(policy) = self.keyless {
            config.reconcile.keyless = policy;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (default: LEDGERDIFF_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Reconcile a source file against a target file
    Reconcile {
        /// Source CSV file
        source: PathBuf,

        /// Target CSV file
        target: PathBuf,

        /// Output format: json, csv or html
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Parse a CSV file and output the normalized records as JSON
    Normalize {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output the raw records as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, policy } => cmd_serve(port, policy).await,

        Commands::Reconcile { source, target, format, output, policy } => {
            cmd_reconcile(&source, &target, &format, output.as_deref(), policy)
        }

        Commands::Normalize { input, output } => cmd_normalize(&input, output.as_deref()),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: Option<u16>, policy: PolicyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = policy.apply(ServerConfig::from_env()?);
    if let Some(port) = port {
        config = config.with_port(port);
    }
    ledgerdiff::server::start_server(config).await
}

fn cmd_reconcile(
    source: &Path,
    target: &Path,
    format_name: &str,
    output: Option<&Path>,
    policy: PolicyArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = policy.apply(ServerConfig::from_env()?);
    let kind = OutputKind::parse(format_name)
        .ok_or_else(|| format!("unknown format '{}' (expected json, csv or html)", format_name))?;

    eprintln!("📄 Source: {}", source.display());
    eprintln!("📄 Target: {}", target.display());

    let store = InMemoryReportStore::new();
    let result = reconcile_files(source, target, &store, &config.reconcile, &CancelToken::new(), "cli")?;

    eprintln!(
        "   Rows: {} source, {} target",
        result.source.row_count, result.target.row_count
    );
    eprintln!("✅ {}", result.report.result.outcome());

    let content = match format::format(&result.report, kind, &config.public_url)? {
        Rendered::Json(body) => serde_json::to_string_pretty(&body)?,
        Rendered::Csv(body) => body,
        Rendered::Html(ctx) => html::render(&ctx),
    };
    write_output(&content, output)?;

    Ok(())
}

fn cmd_normalize(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Normalizing CSV: {}", input.display());

    let result = parse_file_auto(input)?;
    let records = normalize_all(result.records);
    eprintln!("✅ Normalized {} records", records.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_file_auto(input)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

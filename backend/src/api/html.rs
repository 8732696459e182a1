//! HTML page renderer for reconciliation reports.
//!
//! Consumes the [`HtmlContext`] produced by the formatter and writes a
//! standalone page. All record content is escaped.

use std::fmt::Write as _;

use crate::format::HtmlContext;
use crate::models::NormalizedRecord;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;margin:.5rem 0 1.5rem}\
th,td{border:1px solid #ccc;padding:.3rem .6rem;text-align:left}\
th{background:#f4f4f4}.null{color:#999;font-style:italic}\
.src{background:#fff3f3}.tgt{background:#f3fff5}.empty{color:#777}";

/// Escape text for HTML element and attribute content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn cell(value: Option<&str>, class: Option<&str>) -> String {
    match (value, class) {
        (Some(v), None) => format!("<td>{}</td>", escape(v)),
        (Some(v), Some(class)) => format!("<td class=\"{}\">{}</td>", class, escape(v)),
        (None, None) => "<td class=\"null\">null</td>".to_string(),
        (None, Some(class)) => format!("<td class=\"{} null\">null</td>", class),
    }
}

/// Field names across records, in first-seen order.
fn columns(records: &[NormalizedRecord]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn records_table(out: &mut String, title: &str, records: &[NormalizedRecord]) {
    let _ = write!(out, "<h2>{} ({})</h2>", escape(title), records.len());
    if records.is_empty() {
        out.push_str("<p class=\"empty\">None.</p>");
        return;
    }

    let columns = columns(records);
    out.push_str("<table><thead><tr>");
    for name in &columns {
        let _ = write!(out, "<th>{}</th>", escape(name));
    }
    out.push_str("</tr></thead><tbody>");
    for record in records {
        out.push_str("<tr>");
        for name in &columns {
            out.push_str(&cell(record.value(name), None));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
}

/// Render a full report page.
pub fn render(ctx: &HtmlContext<'_>) -> String {
    let mut out = String::new();
    let title = format!("Reconciliation report {}", escape(ctx.id));

    let _ = write!(
        out,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title><style>{style}</style></head><body>\
         <h1>{title}</h1><p>Created {created} &middot; {outcome}</p>\
         <p><a href=\"?output=csv\">Download CSV</a> &middot; <a href=\"?output=json\">JSON</a></p>",
        title = title,
        style = STYLE,
        created = escape(&ctx.created_at),
        outcome = escape(&ctx.outcome),
    );

    records_table(&mut out, "Missing in target", ctx.missing_in_target);
    records_table(&mut out, "Missing in source", ctx.missing_in_source);

    let _ = write!(out, "<h2>Discrepancies ({})</h2>", ctx.discrepancies.len());
    if ctx.discrepancies.is_empty() {
        out.push_str("<p class=\"empty\">None.</p>");
    } else {
        out.push_str("<table><thead><tr><th>Key</th><th>Field</th><th>Source</th><th>Target</th></tr></thead><tbody>");
        for discrepancy in ctx.discrepancies {
            let rows = discrepancy.differences.len();
            for (i, (field, diff)) in discrepancy.differences.iter().enumerate() {
                out.push_str("<tr>");
                if i == 0 {
                    let _ = write!(
                        out,
                        "<td rowspan=\"{}\">{}</td>",
                        rows,
                        escape(&discrepancy.id.to_string())
                    );
                }
                let _ = write!(out, "<td>{}</td>", escape(field));
                out.push_str(&cell(diff.source.as_deref(), Some("src")));
                out.push_str(&cell(diff.target.as_deref(), Some("tgt")));
                out.push_str("</tr>");
            }
        }
        out.push_str("</tbody></table>");
    }

    let diagnostics = &ctx.diagnostics;
    if !diagnostics.duplicates.is_empty() || diagnostics.keyless.source + diagnostics.keyless.target > 0 {
        out.push_str("<h2>Diagnostics</h2><ul>");
        for collision in diagnostics.duplicates {
            let _ = write!(
                out,
                "<li>{} key <code>{}</code>: kept row {}, dropped row {}</li>",
                collision.side,
                escape(&collision.key.to_string()),
                collision.kept_row,
                collision.dropped_row
            );
        }
        if diagnostics.keyless.source + diagnostics.keyless.target > 0 {
            let _ = write!(
                out,
                "<li>Records without a key left out: {} source, {} target</li>",
                diagnostics.keyless.source, diagnostics.keyless.target
            );
        }
        out.push_str("</ul>");
    }

    if !ctx.fields.is_empty() {
        let fields: Vec<String> = ctx.fields.iter().map(|f| escape(f)).collect();
        let _ = write!(out, "<p class=\"empty\">Compared fields: {}</p>", fields.join(", "));
    }

    out.push_str("</body></html>");
    out
}

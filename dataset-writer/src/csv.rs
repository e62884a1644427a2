use karma_core::{PostRecord, POST_COLUMNS};
use std::io::{self, Write};

pub const DEFAULT_SEPARATOR: char = ',';

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single delimited row to any writer.
pub fn write_row<W, S>(mut w: W, row: &[S], sep: char) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first {
            write!(w, "{}", sep)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

pub fn write_header<W: Write>(w: W, sep: char) -> io::Result<()> {
    write_row(w, &POST_COLUMNS, sep)
}

/// Cells of one record in [`POST_COLUMNS`] order. Absent values become
/// empty cells.
pub fn record_cells(record: &PostRecord) -> Vec<String> {
    vec![
        record.id.clone(),
        record.subreddit.clone(),
        record.title.clone(),
        record.selftext.clone(),
        record.score.to_string(),
        optional(record.upvote_ratio.map(format_float)),
        optional(record.ups_raw),
        optional(record.downs_raw),
        optional(record.ups_estimated),
        optional(record.downs_estimated),
        record.num_comments.to_string(),
        format_float(record.created_utc),
        record.permalink.clone(),
        format_bool(record.over_18),
        format_bool(record.is_self),
    ]
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// Shortest round-trip form that keeps a trailing `.0` on whole numbers.
fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

fn format_bool(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

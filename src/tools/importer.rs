//! Bulk import of a vocabulary list CSV into the words table.
//!
//! Expected columns, in order: maori, english, year level, definition,
//! category name. The first row is a header and is skipped. Category names
//! are matched case-insensitively against the category catalog; rows naming
//! an unknown category are skipped and counted rather than failing the run.

use anyhow::{Result, anyhow};
use std::path::Path;
use chrono::Utc;
use tracing::warn;

use crate::dictionary::{self, NewWord};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Split one CSV line into fields. Handles double-quoted fields containing
/// commas and doubled quotes; does not handle embedded newlines.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cur.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

/// Import every row of the CSV at `path`, attributing created words to
/// `created_by`. Returns how many rows were inserted and how many skipped.
pub fn import_vocab_csv(db_root: &str, path: &Path, created_by: i64) -> Result<ImportReport> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?;
    let created_at = Utc::now().timestamp_millis();
    let mut report = ImportReport::default();
    for (lineno, line) in text.lines().enumerate() {
        if lineno == 0 { continue; } // header
        if line.trim().is_empty() { continue; }
        let fields = split_csv_line(line);
        if fields.len() < 5 {
            warn!(line = lineno + 1, "vocab csv row has too few columns, skipping");
            report.skipped += 1;
            continue;
        }
        let year_level: i64 = fields[2].trim().parse().unwrap_or(0);
        let Some(category) = dictionary::find_category_by_name(db_root, &fields[4])? else {
            warn!(line = lineno + 1, category = %fields[4].trim(), "unknown category, skipping row");
            report.skipped += 1;
            continue;
        };
        let word = NewWord {
            maori: fields[0].trim().to_string(),
            english: fields[1].trim().to_string(),
            year_level,
            definition: fields[3].trim().to_string(),
            category_id: category.id,
        };
        dictionary::insert_word(db_root, &word, created_by, created_at)?;
        report.inserted += 1;
    }
    Ok(report)
}

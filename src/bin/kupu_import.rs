//!
//! kupu vocab importer
//! -------------------
//! Command-line entry point for loading a vocabulary CSV into the words
//! table. Usage: kupu_import <csv-path> [--db-root <dir>] [--created-by <id>]

use anyhow::{Result, anyhow};
use std::path::PathBuf;

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let csv_path: PathBuf = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: kupu_import <csv-path> [--db-root <dir>] [--created-by <id>]"))?;
    let db_root = parse_flag(&args, "--db-root")
        .or_else(|| std::env::var("KUPU_DB_FOLDER").ok())
        .unwrap_or_else(|| "data".to_string());
    let created_by: i64 = parse_flag(&args, "--created-by")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);

    kupu::dictionary::ensure_default_categories(&db_root)?;
    let report = kupu::tools::importer::import_vocab_csv(&db_root, &csv_path, created_by)?;
    println!(
        "Imported {} words ({} rows skipped) from {}",
        report.inserted,
        report.skipped,
        csv_path.display()
    );
    Ok(())
}

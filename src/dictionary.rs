//! Parquet-backed word and category tables for the vocabulary dictionary.
//! Same row-store pattern as the credential store in `security`: whole-file
//! read, scan, rewrite. Fine at dictionary scale.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use polars::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Word {
    pub id: i64,
    pub maori: String,
    pub english: String,
    pub year_level: i64,
    pub definition: String,
    pub created_by: i64,
    pub created_at: i64,
    pub category_id: i64,
}

/// A word as submitted; the store assigns the id and timestamps the row.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWord {
    pub maori: String,
    pub english: String,
    pub year_level: i64,
    pub definition: String,
    pub category_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub english_name: String,
}

fn words_path(db_root: &str) -> PathBuf { Path::new(db_root).join("words.parquet") }
fn categories_path(db_root: &str) -> PathBuf { Path::new(db_root).join("categories.parquet") }

fn mk_words_df() -> DataFrame {
    DataFrame::new(vec![
        Series::new("id".into(), Vec::<i64>::new()).into(),
        Series::new("maori".into(), Vec::<String>::new()).into(),
        Series::new("english".into(), Vec::<String>::new()).into(),
        Series::new("year_level".into(), Vec::<i64>::new()).into(),
        Series::new("definition".into(), Vec::<String>::new()).into(),
        Series::new("created_by".into(), Vec::<i64>::new()).into(),
        Series::new("created_at".into(), Vec::<i64>::new()).into(),
        Series::new("category_id".into(), Vec::<i64>::new()).into(),
    ]).unwrap()
}

fn mk_categories_df() -> DataFrame {
    DataFrame::new(vec![
        Series::new("id".into(), Vec::<i64>::new()).into(),
        Series::new("english_name".into(), Vec::<String>::new()).into(),
    ]).unwrap()
}

fn read_df(path: &Path, empty: fn() -> DataFrame) -> Result<DataFrame> {
    if !path.exists() { return Ok(empty()); }
    let file = std::fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    Ok(df)
}

fn write_df(path: &Path, mut df: DataFrame) -> Result<()> {
    if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
    let mut f = std::fs::File::create(path)?;
    ParquetWriter::new(&mut f).finish(&mut df)?;
    Ok(())
}

fn str_at(df: &DataFrame, col: &str, i: usize) -> Result<String> {
    match df.column(col)?.get(i)? {
        AnyValue::String(s) => Ok(s.to_string()),
        AnyValue::StringOwned(s) => Ok(s.to_string()),
        other => Err(anyhow!("{}: unexpected value {:?} at row {}", col, other, i)),
    }
}

fn i64_at(df: &DataFrame, col: &str, i: usize) -> Result<i64> {
    df.column(col)?.i64()?.get(i).ok_or_else(|| anyhow!("{}: null at row {}", col, i))
}

fn word_at(df: &DataFrame, i: usize) -> Result<Word> {
    Ok(Word {
        id: i64_at(df, "id", i)?,
        maori: str_at(df, "maori", i)?,
        english: str_at(df, "english", i)?,
        year_level: i64_at(df, "year_level", i)?,
        definition: str_at(df, "definition", i)?,
        created_by: i64_at(df, "created_by", i)?,
        created_at: i64_at(df, "created_at", i)?,
        category_id: i64_at(df, "category_id", i)?,
    })
}

fn category_at(df: &DataFrame, i: usize) -> Result<Category> {
    Ok(Category { id: i64_at(df, "id", i)?, english_name: str_at(df, "english_name", i)? })
}

fn next_id(df: &DataFrame) -> Result<i64> {
    let mut max_id: i64 = 0;
    for i in 0..df.height() {
        if let Some(id) = df.column("id")?.i64()?.get(i) { max_id = max_id.max(id); }
    }
    Ok(max_id + 1)
}

pub fn list_categories(db_root: &str) -> Result<Vec<Category>> {
    let df = read_df(&categories_path(db_root), mk_categories_df)?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() { out.push(category_at(&df, i)?); }
    Ok(out)
}

pub fn find_category(db_root: &str, id: i64) -> Result<Option<Category>> {
    let df = read_df(&categories_path(db_root), mk_categories_df)?;
    for i in 0..df.height() {
        if df.column("id")?.i64()?.get(i) == Some(id) {
            return Ok(Some(category_at(&df, i)?));
        }
    }
    Ok(None)
}

/// Case-insensitive name lookup, used by the CSV importer where the vocab
/// list spells category names with inconsistent casing.
pub fn find_category_by_name(db_root: &str, name: &str) -> Result<Option<Category>> {
    let wanted = name.trim().to_lowercase();
    for cat in list_categories(db_root)? {
        if cat.english_name.trim().to_lowercase() == wanted {
            return Ok(Some(cat));
        }
    }
    Ok(None)
}

pub fn insert_category(db_root: &str, english_name: &str) -> Result<i64> {
    if find_category_by_name(db_root, english_name)?.is_some() {
        return Err(anyhow!("category already exists: {}", english_name));
    }
    let p = categories_path(db_root);
    let df = read_df(&p, mk_categories_df)?;
    let id = next_id(&df)?;
    let new = DataFrame::new(vec![
        Series::new("id".into(), vec![id]).into(),
        Series::new("english_name".into(), vec![english_name.to_string()]).into(),
    ])?;
    if df.height() == 0 { write_df(&p, new)?; } else { let stacked = df.vstack(&new)?; write_df(&p, stacked)?; }
    Ok(id)
}

pub fn list_words(db_root: &str) -> Result<Vec<Word>> {
    let df = read_df(&words_path(db_root), mk_words_df)?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() { out.push(word_at(&df, i)?); }
    Ok(out)
}

pub fn words_in_category(db_root: &str, category_id: i64) -> Result<Vec<Word>> {
    let df = read_df(&words_path(db_root), mk_words_df)?;
    let mut out = Vec::new();
    for i in 0..df.height() {
        if df.column("category_id")?.i64()?.get(i) == Some(category_id) {
            out.push(word_at(&df, i)?);
        }
    }
    Ok(out)
}

pub fn find_word(db_root: &str, id: i64) -> Result<Option<Word>> {
    let df = read_df(&words_path(db_root), mk_words_df)?;
    for i in 0..df.height() {
        if df.column("id")?.i64()?.get(i) == Some(id) {
            return Ok(Some(word_at(&df, i)?));
        }
    }
    Ok(None)
}

/// Insert a word created by `created_by` at `created_at` (epoch ms) and
/// return the assigned id. The referenced category must exist.
pub fn insert_word(db_root: &str, w: &NewWord, created_by: i64, created_at: i64) -> Result<i64> {
    if find_category(db_root, w.category_id)?.is_none() {
        return Err(anyhow!("no such category: {}", w.category_id));
    }
    let p = words_path(db_root);
    let df = read_df(&p, mk_words_df)?;
    let id = next_id(&df)?;
    let new = DataFrame::new(vec![
        Series::new("id".into(), vec![id]).into(),
        Series::new("maori".into(), vec![w.maori.clone()]).into(),
        Series::new("english".into(), vec![w.english.clone()]).into(),
        Series::new("year_level".into(), vec![w.year_level]).into(),
        Series::new("definition".into(), vec![w.definition.clone()]).into(),
        Series::new("created_by".into(), vec![created_by]).into(),
        Series::new("created_at".into(), vec![created_at]).into(),
        Series::new("category_id".into(), vec![w.category_id]).into(),
    ])?;
    if df.height() == 0 { write_df(&p, new)?; } else { let stacked = df.vstack(&new)?; write_df(&p, stacked)?; }
    Ok(id)
}

/// Remove a word; true if a row was actually deleted.
pub fn delete_word(db_root: &str, id: i64) -> Result<bool> {
    let p = words_path(db_root);
    let df = read_df(&p, mk_words_df)?;
    if df.height() == 0 { return Ok(false); }
    let ids = df.column("id")?.i64()?.clone();
    let mask: ChunkedArray<BooleanType> = ids.iter().map(|v| v != Some(id)).collect();
    let rest = df.filter(&mask)?;
    let removed = rest.height() < df.height();
    write_df(&p, rest)?;
    Ok(removed)
}

/// Seed the category catalog on first run so the importer and the teacher UI
/// have something to attach words to.
pub fn ensure_default_categories(db_root: &str) -> Result<()> {
    let p = categories_path(db_root);
    if p.exists() { return Ok(()); }
    for name in ["Animals", "Food", "People", "Places", "Actions", "Numbers"] {
        insert_category(db_root, name)?;
    }
    Ok(())
}

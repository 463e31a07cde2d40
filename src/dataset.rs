use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::data::{DatasetSource, RawRow};
use crate::links::{ImageRef, ImageResolver};

pub const WEEK_KEY_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S%.f",
    "%Y.%m.%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%m/%d/%Y"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub media: String,
    pub date: Option<NaiveDate>,
    pub category: String,
    pub title: String,
    pub contents: String,
    pub image: Option<ImageRef>,
}

impl Record {
    /// Grouping key (`YYYY-MM-DD`) or `None` when the row had no usable date.
    pub fn week_key(&self) -> Option<String> {
        self.date.map(format_week_key)
    }

    pub fn date_label(&self) -> String {
        self.week_key().unwrap_or_else(|| "-".to_string())
    }

    /// Case-insensitive substring match on title OR contents. `needle` must
    /// already be lowercase.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        field_contains(&self.title, needle) || field_contains(&self.contents, needle)
    }
}

fn field_contains(field: &str, needle: &str) -> bool {
    !field.is_empty() && field.to_lowercase().contains(needle)
}

pub fn format_week_key(date: NaiveDate) -> String {
    date.format(WEEK_KEY_FORMAT).to_string()
}

/// Parses the spreadsheet's date cell, dropping any time-of-day component.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// The normalized, immutable table plus its week index.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    weeks: Vec<String>,
}

impl Dataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        let distinct: BTreeSet<String> = records.iter().filter_map(Record::week_key).collect();
        let weeks = distinct.into_iter().rev().collect();
        Self { records, weeks }
    }

    pub fn from_rows(rows: Vec<RawRow>, resolver: &ImageResolver) -> Self {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| normalize_row(idx, row, resolver))
            .collect();
        Self::from_records(records)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct week keys, newest first.
    pub fn weeks(&self) -> &[String] {
        &self.weeks
    }

    pub fn latest_week(&self) -> Option<&str> {
        self.weeks.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one week in table order.
    pub fn records_for_week<'a>(&'a self, week: &str) -> Vec<&'a Record> {
        self.records
            .iter()
            .filter(|record| record.week_key().as_deref() == Some(week))
            .collect()
    }

    pub fn week_len(&self, week: &str) -> usize {
        self.records
            .iter()
            .filter(|record| record.week_key().as_deref() == Some(week))
            .count()
    }

    /// Every record whose title or contents contains `query`, ignoring case.
    pub fn search<'a>(&'a self, query: &str) -> Vec<&'a Record> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|record| record.matches_lowercase(&needle))
            .collect()
    }
}

fn normalize_row(idx: usize, row: RawRow, resolver: &ImageResolver) -> Record {
    let date = normalize_date(&row.date);
    if date.is_none() && !row.date.trim().is_empty() {
        debug!(row = idx + 1, value = %row.date, "unparseable date; row left out of week grouping");
    }
    let image = resolver.resolve(&row.image_url, &row.file);
    Record {
        media: row.media.trim().to_string(),
        date,
        category: row.category.trim().to_string(),
        title: row.title.trim().to_string(),
        contents: row.contents.trim().to_string(),
        image,
    }
}

/// Reads and normalizes the whole dataset once. Any failure here is fatal
/// for the caller.
pub fn load(source: &dyn DatasetSource, resolver: &ImageResolver) -> Result<Dataset> {
    let rows = source
        .read_rows()
        .with_context(|| format!("load dataset from {}", source.describe()))?;
    let dataset = Dataset::from_rows(rows, resolver);
    info!(
        records = dataset.len(),
        weeks = dataset.weeks().len(),
        source = %source.describe(),
        "dataset loaded"
    );
    Ok(dataset)
}

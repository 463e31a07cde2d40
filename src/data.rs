use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;

pub const COLUMN_DATE: &str = "Date";
pub const COLUMN_MEDIA: &str = "Media";
pub const COLUMN_CATEGORY: &str = "Category";
pub const COLUMN_TITLE: &str = "Title";
pub const COLUMN_CONTENTS: &str = "Contents";
pub const COLUMN_IMAGE_URL: &str = "Image URL";
pub const COLUMN_FILE: &str = "file";

pub const REQUIRED_COLUMNS: [&str; 7] = [
    COLUMN_DATE,
    COLUMN_MEDIA,
    COLUMN_CATEGORY,
    COLUMN_TITLE,
    COLUMN_CONTENTS,
    COLUMN_IMAGE_URL,
    COLUMN_FILE,
];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("dataset not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to open dataset at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse dataset at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("dataset is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// One row exactly as it appears in the source table, before any
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub date: String,
    pub media: String,
    pub category: String,
    pub title: String,
    pub contents: String,
    pub image_url: String,
    pub file: String,
}

pub trait DatasetSource {
    fn describe(&self) -> String;
    fn read_rows(&self) -> Result<Vec<RawRow>>;
}

pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_rows(&self) -> Result<Vec<RawRow>> {
        if !self.path.exists() {
            return Err(LoadError::NotFound(self.path.clone()).into());
        }
        let file = File::open(&self.path).map_err(|source| LoadError::Open {
            path: self.path.clone(),
            source,
        })?;
        let rows = read_csv(file).map_err(|err| match err {
            CsvFailure::Columns(missing) => LoadError::MissingColumns(missing),
            CsvFailure::Csv(source) => LoadError::Parse {
                path: self.path.clone(),
                source,
            },
        })?;
        Ok(rows)
    }
}

#[derive(Debug)]
enum CsvFailure {
    Columns(Vec<String>),
    Csv(csv::Error),
}

impl From<csv::Error> for CsvFailure {
    fn from(err: csv::Error) -> Self {
        CsvFailure::Csv(err)
    }
}

struct ColumnIndex {
    date: usize,
    media: usize,
    category: usize,
    title: usize,
    contents: usize,
    image_url: usize,
    file: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> std::result::Result<Self, Vec<String>> {
        let names: Vec<String> = headers
            .iter()
            .map(|name| name.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let find = |wanted: &str| names.iter().position(|name| name == wanted);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| find(**column).is_none())
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let column = |wanted: &str| find(wanted).unwrap_or_default();
        Ok(Self {
            date: column(COLUMN_DATE),
            media: column(COLUMN_MEDIA),
            category: column(COLUMN_CATEGORY),
            title: column(COLUMN_TITLE),
            contents: column(COLUMN_CONTENTS),
            image_url: column(COLUMN_IMAGE_URL),
            file: column(COLUMN_FILE),
        })
    }

    fn row(&self, record: &csv::StringRecord) -> RawRow {
        let cell = |idx: usize| record.get(idx).unwrap_or("").to_string();
        RawRow {
            date: cell(self.date),
            media: cell(self.media),
            category: cell(self.category),
            title: cell(self.title),
            contents: cell(self.contents),
            image_url: cell(self.image_url),
            file: cell(self.file),
        }
    }
}

fn read_csv<R: io::Read>(input: R) -> std::result::Result<Vec<RawRow>, CsvFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::from_headers(&headers).map_err(CsvFailure::Columns)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(columns.row(&record));
    }
    Ok(rows)
}

/// Rows supplied directly, used for tests and the bundled demo report.
#[derive(Default)]
pub struct MemorySource {
    rows: Vec<RawRow>,
}

impl MemorySource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }
}

impl DatasetSource for MemorySource {
    fn describe(&self) -> String {
        format!("{} in-memory row(s)", self.rows.len())
    }

    fn read_rows(&self) -> Result<Vec<RawRow>> {
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "Date,Media,Category,Title,Contents,Image URL,file\n";

    #[test]
    fn reads_rows_by_header_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let body = format!(
            "{HEADER}2024-03-01,KBS,Broadcast,\"Evening, News\",Body text,,a.png\n"
        );
        fs::write(&path, body).unwrap();

        let rows = CsvSource::new(&path).read_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].media, "KBS");
        assert_eq!(rows[0].title, "Evening, News");
        assert_eq!(rows[0].image_url, "");
        assert_eq!(rows[0].file, "a.png");
    }

    #[test]
    fn column_order_and_extra_columns_do_not_matter() {
        let input = "file,Notes,Title,Contents,Media,Date,Category,Image URL\n\
                     x.png,ignored,T,C,M,2024-01-01,Cat,http://a\n";
        let rows = read_csv(input.as_bytes()).unwrap();
        assert_eq!(rows[0].file, "x.png");
        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[0].image_url, "http://a");
    }

    #[test]
    fn short_rows_are_padded_and_blank_rows_skipped() {
        let input = format!("{HEADER}2024-01-01,M,C,T\n,,,,,,\n");
        let rows = read_csv(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contents, "");
        assert_eq!(rows[0].file, "");
    }

    #[test]
    fn byte_order_mark_is_tolerated() {
        let input = format!("\u{feff}{HEADER}2024-01-01,M,C,T,B,,\n");
        let rows = read_csv(input.as_bytes()).unwrap();
        assert_eq!(rows[0].date, "2024-01-01");
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Date,Media,Title\n2024-01-01,M,T\n").unwrap();

        let err = CsvSource::new(&path).read_rows().unwrap_err();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::MissingColumns(missing)) => {
                assert_eq!(missing, &["Category", "Contents", "Image URL", "file"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = CsvSource::new(dir.path().join("nope.csv"))
            .read_rows()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::NotFound(_))
        ));
    }
}

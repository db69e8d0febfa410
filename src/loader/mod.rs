//! Readers for raw listing dumps written by the scraping side:
//! a JSON array of listing objects, or a CSV with one column per raw field.

use crate::models::RawListingRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing JSON listings in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("reading CSV header in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported listing file {0:?} (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(InputFormat::Json),
            "csv" => Some(InputFormat::Csv),
            _ => None,
        }
    }
}

/// Parse listings from file contents already in memory.
pub fn parse_listings(
    path: &Path,
    bytes: &[u8],
) -> Result<Vec<RawListingRecord>, LoaderError> {
    match InputFormat::from_path(path) {
        Some(InputFormat::Json) => parse_json(path, bytes),
        Some(InputFormat::Csv) => parse_csv(path, bytes),
        None => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn parse_json(path: &Path, bytes: &[u8]) -> Result<Vec<RawListingRecord>, LoaderError> {
    let listings: Vec<RawListingRecord> =
        serde_json::from_slice(bytes).map_err(|source| LoaderError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    info!("{:?}: {} listings loaded", path, listings.len());
    Ok(listings)
}

/// Unknown columns are ignored, missing ones default to empty; rows that
/// fail to decode are skipped.
fn parse_csv(path: &Path, bytes: &[u8]) -> Result<Vec<RawListingRecord>, LoaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    reader.headers().map_err(|source| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let mut listings = Vec::new();
    for (i, result) in reader.deserialize::<RawListingRecord>().enumerate() {
        match result {
            Ok(row) => listings.push(row),
            Err(e) => warn!("Row {} in {:?}: {}", i + 1, path, e),
        }
    }

    info!("{:?}: {} listings loaded", path, listings.len());
    Ok(listings)
}

/// A single listing file, or every `.json` / `.csv` in a directory sorted by
/// path so runs iterate inputs in a stable order.
pub fn discover_listing_files(path: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        debug!("Input path {:?} does not exist", path);
        return Ok(vec![]);
    }

    let io_err = |source: std::io::Error| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_err)? {
        let p = entry.map_err(io_err)?.path();
        if p.is_file() && InputFormat::from_path(&p).is_some() {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let json = br#"[
            {"city": "douala", "rent_price_raw": "150k FCFA/mois", "source_site": "Mapiole"},
            {"city": "yaounde", "neighborhood": "Bastos", "extra": 1}
        ]"#;
        let rows = parse_listings(Path::new("raw.json"), json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rent_price_raw, "150k FCFA/mois");
        assert_eq!(rows[1].neighborhood, "Bastos");
        assert!(rows[1].source_site.is_empty());
    }

    #[test]
    fn test_parse_json_rejects_non_array() {
        let err = parse_listings(Path::new("raw.json"), br#"{"city": "douala"}"#).unwrap_err();
        assert!(matches!(err, LoaderError::Json { .. }));
    }

    #[test]
    fn test_parse_csv_with_partial_columns() {
        let csv = "city,neighborhood,rent_price_raw,listing_date\n\
                   Douala, Akwa ,\"200 000 FCFA\",2025-03-01\n\
                   Yaounde,Bastos,1.2M XAF/an,\n";
        let rows = parse_listings(Path::new("raw.CSV"), csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].neighborhood, "Akwa");
        assert_eq!(rows[0].rent_price_raw, "200 000 FCFA");
        assert_eq!(rows[1].listing_date, "");
        assert!(rows[1].bedrooms_raw.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_listings(Path::new("raw.xlsx"), b"").unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_discover_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let files = discover_listing_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.json"]);

        assert!(discover_listing_files(&dir.path().join("missing")).unwrap().is_empty());
    }
}

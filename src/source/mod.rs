use crate::loader::{discover_listing_files, parse_listings};
use crate::models::RawListingRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable provider of raw listings (scraper dumps, fixtures, ...).
#[async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_listings(&self) -> Result<Vec<RawListingRecord>>;
}

// ── Files on disk ─────────────────────────────────────────────────────────────

/// Reads a listing file, or every listing file in a directory.
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("files:{}", path.display());
        Self { path, name }
    }
}

#[async_trait]
impl ListingSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_listings(&self) -> Result<Vec<RawListingRecord>> {
        let files = discover_listing_files(&self.path)?;
        if files.is_empty() {
            warn!("No listing files found at {:?}", self.path);
        }

        let mut all = Vec::new();
        for path in &files {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {:?}", path))?;
            let listings = parse_listings(path, &bytes)?;
            all.extend(listings);
        }

        info!("{}: {} raw listings from {} files", self.name, all.len(), files.len());
        Ok(all)
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────────

pub struct MemorySource {
    listings: Vec<RawListingRecord>,
}

impl MemorySource {
    pub fn new(listings: Vec<RawListingRecord>) -> Self {
        Self { listings }
    }
}

#[async_trait]
impl ListingSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_listings(&self) -> Result<Vec<RawListingRecord>> {
        Ok(self.listings.clone())
    }
}

//! Last-run watermark.
//!
//! A plain text file holding one ISO date (`YYYY-MM-DD`): papers updated before
//! this date have already been fetched.

use crate::error::Result;
use chrono::{Duration, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads and writes the watermark file
pub struct WatermarkStore {
    path: PathBuf,
    default_lookback_days: i64,
}

impl WatermarkStore {
    /// Create a store with the 7-day default lookback
    pub fn new(path: PathBuf) -> Self {
        Self::with_lookback(path, 7)
    }

    /// Create a store that falls back to `today - lookback_days`
    pub fn with_lookback(path: PathBuf, default_lookback_days: i64) -> Self {
        Self {
            path,
            default_lookback_days,
        }
    }

    /// Get the watermark file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored date, or `today - lookback` when the file is absent or unreadable.
    pub fn read(&self, today: NaiveDate) -> NaiveDate {
        let fallback = today - Duration::days(self.default_lookback_days);

        if !self.path.exists() {
            debug!("Watermark not found: {:?}", self.path);
            return fallback;
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match NaiveDate::parse_from_str(content.trim(), DATE_FORMAT) {
                Ok(date) => date,
                Err(e) => {
                    warn!("Invalid watermark {:?}: {}", content.trim(), e);
                    fallback
                }
            },
            Err(e) => {
                warn!("Failed to read watermark file: {}", e);
                fallback
            }
        }
    }

    /// Overwrite the watermark with `date`
    pub fn write(&self, date: NaiveDate) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, date.format(DATE_FORMAT).to_string())?;
        info!("Watermark set to {} in {:?}", date, self.path);
        Ok(())
    }
}

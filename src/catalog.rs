//! Persistent paper catalog.
//!
//! On disk the catalog is one pretty-printed JSON object:
//! `{ topic: { paper_id: entry, ... }, ... }`. Entries are stored as
//! structured [`PaperEntry`] objects; pre-formatted Markdown rows written by
//! older versions are still accepted and kept verbatim.

use crate::arxiv::PaperRecord;
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rendered in the Code column when no repository is known
pub const NO_CODE_URL: &str = "null";

/// Paper id -> entry, for one topic
pub type TopicEntries = BTreeMap<String, CatalogEntry>;

/// One catalogued paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperEntry {
    /// Date of the last update
    pub date: NaiveDate,
    pub title: String,
    pub categories: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Identifier without version suffix
    pub id: String,
    /// Canonical abstract page
    pub url: String,
    #[serde(default)]
    pub code_url: Option<String>,
}

impl PaperEntry {
    pub fn from_record(record: &PaperRecord) -> Self {
        Self {
            date: record.updated_date(),
            title: record.title.clone(),
            categories: record.categories.clone(),
            abstract_text: record.summary.replace('\n', " "),
            id: record.paper_id().to_string(),
            url: record.entry_id.clone(),
            code_url: record.code_url.clone(),
        }
    }

    /// Markdown table row (newline-terminated)
    pub fn to_row(&self) -> String {
        let code = match self.code_url.as_deref() {
            Some(url) => format!("**[{url}]({url})**"),
            None => NO_CODE_URL.to_string(),
        };
        format!(
            "|**{}**|**{}**|{}|{}|[{}]({})|{}|\n",
            self.date.format("%Y-%m-%d"),
            self.title,
            self.categories.join(", "),
            self.abstract_text,
            self.id,
            self.url,
            code
        )
    }
}

/// Catalog value: a structured paper or a legacy pre-rendered row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogEntry {
    Paper(PaperEntry),
    Row(String),
}

impl CatalogEntry {
    pub fn to_row(&self) -> String {
        match self {
            Self::Paper(paper) => paper.to_row(),
            Self::Row(row) => row.clone(),
        }
    }

    /// `YYYY-MM-DD` used to order rows (newest first when rendering)
    pub fn sort_key(&self) -> String {
        match self {
            Self::Paper(paper) => paper.date.format("%Y-%m-%d").to_string(),
            Self::Row(row) => row.split('|').nth(1).unwrap_or_default().trim_matches('*').to_string(),
        }
    }
}

impl From<PaperEntry> for CatalogEntry {
    fn from(paper: PaperEntry) -> Self {
        Self::Paper(paper)
    }
}

/// Topic -> paper id -> entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    topics: BTreeMap<String, TopicEntries>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding a single topic
    pub fn single(topic: impl Into<String>, entries: TopicEntries) -> Self {
        let mut topics = BTreeMap::new();
        topics.insert(topic.into(), entries);
        Self { topics }
    }

    pub fn topic(&self, name: &str) -> Option<&TopicEntries> {
        self.topics.get(name)
    }

    pub fn topics(&self) -> impl Iterator<Item = (&String, &TopicEntries)> {
        self.topics.iter()
    }

    /// Number of entries across all topics
    pub fn len(&self) -> usize {
        self.topics.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union-merge `other` into `self`: new ids are added, existing ids are
    /// overwritten, every other entry is kept.
    pub fn merge(&mut self, other: &Catalog) {
        for (topic, entries) in &other.topics {
            self.topics
                .entry(topic.clone())
                .or_default()
                .extend(entries.iter().map(|(id, entry)| (id.clone(), entry.clone())));
        }
    }
}

/// Where merged catalog updates go.
pub trait CatalogSink {
    /// Merge `updates` into the stored catalog, persist it, and return the merged catalog.
    fn merge(&self, updates: &Catalog) -> Result<Catalog>;
}

/// Catalog stored as a JSON file
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog
    ///
    /// Returns an empty catalog if the file doesn't exist or is invalid
    pub fn load(&self) -> Catalog {
        if !self.path.exists() {
            debug!("Catalog not found: {:?}", self.path);
            return Catalog::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Catalog>(&content) {
                Ok(catalog) => {
                    debug!("Loaded {} entries from {:?}", catalog.len(), self.path);
                    catalog
                }
                Err(e) => {
                    warn!("Failed to parse catalog, starting empty: {}", e);
                    Catalog::new()
                }
            },
            Err(e) => {
                warn!("Failed to read catalog file, starting empty: {}", e);
                Catalog::new()
            }
        }
    }

    /// Write the catalog, replacing the file in one rename
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(catalog)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        info!("Saved {} entries to {:?}", catalog.len(), self.path);
        Ok(())
    }
}

impl CatalogSink for CatalogFile {
    fn merge(&self, updates: &Catalog) -> Result<Catalog> {
        let mut catalog = self.load();
        catalog.merge(updates);
        self.save(&catalog)?;
        Ok(catalog)
    }
}

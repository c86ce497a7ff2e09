//! Fetch-and-merge orchestrator.
//!
//! A run reads the watermark, drives the paginated search for one topic,
//! enriches every record with its code URL, archives its PDF, and folds the
//! resulting entries into the catalog. Seed runs persist the catalog every
//! `checkpoint_every` records so that a long run keeps its progress.
//!
//! Everything is sequential: one record is fully processed (lookup, download,
//! pause) before the next one is pulled from the stream.

use crate::arxiv::{build_search_query, ArxivClient, PageSource, PaperRecord, SearchRequest};
use crate::catalog::{Catalog, CatalogEntry, CatalogFile, CatalogSink, PaperEntry, TopicEntries};
use crate::config::{MonitorConfig, Topic};
use crate::download::{DocumentFetcher, DownloadOutcome, PdfDownloader};
use crate::error::Result;
use crate::render;
use crate::semantic_scholar::{CodeUrlLookup, SemanticScholarClient};
use crate::stream::paginate;
use crate::watermark::WatermarkStore;
use chrono::{Duration, NaiveDate};
use futures::StreamExt;
use std::time::Instant;
use tracing::{debug, error, info};

/// Outcome of a full run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Lower bound of the fetch window
    pub start_date: NaiveDate,
    /// Records processed during this run
    pub fetched: usize,
    /// Entries in the catalog after the final merge
    pub catalog_size: usize,
}

/// Orchestrates one topic's fetch, enrichment and persistence
pub struct Monitor<S, L, D, C> {
    config: MonitorConfig,
    source: S,
    lookup: L,
    documents: D,
    catalog: C,
}

impl Monitor<ArxivClient, SemanticScholarClient, PdfDownloader, CatalogFile> {
    /// Monitor backed by the real remote APIs and the JSON catalog file
    pub fn from_config(config: MonitorConfig) -> Result<Self> {
        let source = ArxivClient::new(&config)?;
        let lookup = SemanticScholarClient::new(&config)?;
        let documents = PdfDownloader::new(&config)?;
        let catalog = CatalogFile::new(config.catalog_path.clone());
        Ok(Self::new(config, source, lookup, documents, catalog))
    }
}

impl<S, L, D, C> Monitor<S, L, D, C>
where
    S: PageSource,
    L: CodeUrlLookup,
    D: DocumentFetcher,
    C: CatalogSink,
{
    pub fn new(config: MonitorConfig, source: S, lookup: L, documents: D, catalog: C) -> Self {
        Self {
            config,
            source,
            lookup,
            documents,
            catalog,
        }
    }

    fn watermark(&self) -> WatermarkStore {
        WatermarkStore::with_lookback(self.config.watermark_path.clone(), self.config.default_lookback_days)
    }

    /// First day of the fetch window: five years back when seeding, the watermark otherwise
    pub fn start_date(&self, seed: bool, today: NaiveDate) -> NaiveDate {
        if seed {
            today - Duration::days(self.config.seed_lookback_days)
        } else {
            self.watermark().read(today)
        }
    }

    /// Fetch, merge and persist one topic, then refresh the summary and advance the watermark.
    pub async fn run(&self, topic: &Topic, seed: bool, today: NaiveDate) -> Result<RunSummary> {
        let start_date = self.start_date(seed, today);
        if seed {
            info!(since = %start_date, "Seeding");
        } else {
            info!(since = %start_date, "Updating");
        }

        let new_data = self.fetch_topic(topic, start_date, today, seed).await?;
        let fetched = new_data.topic(&topic.name).map_or(0, TopicEntries::len);

        let merged = self.catalog.merge(&new_data)?;
        render::write_readme(&self.config.readme_path, &merged, &self.config.repo, today)?;
        self.watermark().write(today)?;

        Ok(RunSummary {
            start_date,
            fetched,
            catalog_size: merged.len(),
        })
    }

    /// All new entries for `topic` in the window `[start_date, today]`.
    ///
    /// Seed runs are unbounded and checkpoint into the catalog every
    /// `checkpoint_every` records; incremental runs stop at `incremental_cap`.
    pub async fn fetch_topic(&self, topic: &Topic, start_date: NaiveDate, today: NaiveDate, seed: bool) -> Result<Catalog> {
        let started = Instant::now();
        let request = SearchRequest {
            query: build_search_query(&topic.query, &self.config.categories, start_date, today),
            max_results: if seed { None } else { Some(self.config.incremental_cap) },
            start_date,
            page_size: self.config.page_size,
        };
        debug!(query = %request.query, "Search query");

        let mut entries = TopicEntries::new();
        let mut processed = 0usize;

        let records = paginate(&self.source, &request, 0);
        let mut records = std::pin::pin!(records);

        while let Some(record) = records.next().await {
            processed += 1;
            let entry = self.process(record).await;
            entries.insert(entry.id.clone(), CatalogEntry::Paper(entry));

            if seed && self.config.checkpoint_every > 0 && processed % self.config.checkpoint_every == 0 {
                info!(processed, "Updating catalog incrementally");
                self.catalog.merge(&Catalog::single(topic.name.clone(), entries.clone()))?;
            }
        }

        info!(
            processed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Fetch complete"
        );
        Ok(Catalog::single(topic.name.clone(), entries))
    }

    /// Enrich and archive one record, then pause to respect the remote rate limits
    async fn process(&self, mut record: PaperRecord) -> PaperEntry {
        let paper_id = record.paper_id().to_string();
        record.code_url = self.lookup.code_url(&paper_id).await;

        match self.documents.download(&record.pdf_url, &record.title).await {
            Ok(DownloadOutcome::Saved(path)) => debug!(paper_id = %paper_id, path = %path.display(), "PDF archived"),
            Ok(DownloadOutcome::Skipped { .. }) => debug!(paper_id = %paper_id, "PDF skipped"),
            Err(e) => error!(paper_id = %paper_id, title = %record.title, error = %e, "Failed to download PDF"),
        }
        tokio::time::sleep(self.config.api_delay).await;

        info!(title = %record.title, updated = %record.updated_date(), "New paper");
        PaperEntry::from_record(&record)
    }
}

//! Paginated search results as a lazy stream.
//!
//! [`paginate`] walks the pages of a [`PageSource`] and yields one
//! [`PaperRecord`] at a time. It never fails: a broken first page yields
//! nothing, a broken later page ends the stream after everything already
//! yielded, and malformed entries are skipped with a warning.
//!
//! The remote date-range query is only a coarse pre-filter; records whose last
//! update is before `request.start_date` are dropped here.

use crate::arxiv::{AtomEntry, PageSource, PaperRecord, SearchRequest};
use crate::error::MonitorError;
use futures::stream::{self, Stream};
use tracing::{error, info, warn};

/// Lazy, forward-only sequence of records matching `request`, starting at `offset`.
pub fn paginate<'a, S: PageSource>(
    source: &'a S,
    request: &'a SearchRequest,
    offset: usize,
) -> impl Stream<Item = PaperRecord> + 'a {
    stream::unfold(Pager::new(source, request, offset), |mut pager| async move {
        let record = pager.next_record().await?;
        Some((record, pager))
    })
}

enum Phase {
    NotStarted,
    Paging,
    Finished,
}

struct Pager<'a, S> {
    source: &'a S,
    request: &'a SearchRequest,
    phase: Phase,
    /// Offset of the page currently being drained
    offset: usize,
    /// Records still allowed (`None` = unbounded)
    limit: Option<usize>,
    total_results: usize,
    yielded: usize,
    page_len: usize,
    entries: std::vec::IntoIter<AtomEntry>,
}

impl<'a, S: PageSource> Pager<'a, S> {
    fn new(source: &'a S, request: &'a SearchRequest, offset: usize) -> Self {
        let mut pager = Self {
            source,
            request,
            phase: Phase::NotStarted,
            offset,
            limit: None,
            total_results: 0,
            yielded: 0,
            page_len: 0,
            entries: Vec::new().into_iter(),
        };

        if let Some(max) = request.max_results {
            match max.checked_sub(offset) {
                Some(limit) if limit > 0 => pager.limit = Some(limit),
                _ => {
                    info!(max_results = max, offset, "Offset at or beyond result cap; nothing to fetch");
                    pager.phase = Phase::Finished;
                }
            }
        }

        pager
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.yielded >= limit)
    }

    fn load(&mut self, entries: Vec<AtomEntry>) {
        self.page_len = entries.len();
        self.entries = entries.into_iter();
    }

    async fn next_record(&mut self) -> Option<PaperRecord> {
        loop {
            match self.phase {
                Phase::Finished => return None,
                Phase::NotStarted => self.fetch_first_page().await,
                Phase::Paging => {
                    if self.limit_reached() {
                        info!(yielded = self.yielded, "Reached result cap");
                        self.phase = Phase::Finished;
                        continue;
                    }

                    if let Some(entry) = self.entries.next() {
                        if let Some(record) = self.accept(entry) {
                            self.yielded += 1;
                            return Some(record);
                        }
                        continue;
                    }

                    self.offset += self.page_len;
                    if self.offset >= self.total_results {
                        info!(total_results = self.total_results, "Reached total results");
                        self.phase = Phase::Finished;
                        continue;
                    }
                    self.fetch_next_page().await;
                }
            }
        }
    }

    /// Parse and date-filter one entry
    fn accept(&self, entry: AtomEntry) -> Option<PaperRecord> {
        match PaperRecord::from_entry(entry) {
            Ok(record) if record.updated_date() >= self.request.start_date => Some(record),
            Ok(_) => None,
            Err(e) => {
                warn!(offset = self.offset, error = %e, "Skipping partial result");
                None
            }
        }
    }

    async fn fetch_first_page(&mut self) {
        match self.source.fetch_page(self.request, self.offset, true).await {
            Ok(page) if page.entries.is_empty() => {
                info!("Got empty first page; stopping");
                self.phase = Phase::Finished;
            }
            Ok(page) => {
                info!(
                    entries = page.entries.len(),
                    total_results = page.total_results,
                    "Got first page"
                );
                self.total_results = page.total_results;
                self.load(page.entries);
                self.phase = Phase::Paging;
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch first page");
                self.phase = Phase::Finished;
            }
        }
    }

    async fn fetch_next_page(&mut self) {
        match self.source.fetch_page(self.request, self.offset, false).await {
            Ok(page) if page.entries.is_empty() => {
                info!(offset = self.offset, "Empty page; treating as end of results");
                self.phase = Phase::Finished;
            }
            Ok(page) => self.load(page.entries),
            Err(MonitorError::EmptyPage { offset }) => {
                info!(offset, "Empty page; treating as end of results");
                self.phase = Phase::Finished;
            }
            Err(e) => {
                error!(
                    offset = self.offset,
                    error = %e,
                    "Failed to fetch page; stopping with collected results"
                );
                self.phase = Phase::Finished;
            }
        }
    }
}

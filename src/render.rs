//! Markdown summary of the catalog.
//!
//! Regenerated in full on every run: a header, an About section, one table per
//! non-empty topic (newest first) and the repository shield links.

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::Result;
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

const TABLE_HEADER: &str = "| Date | Title | Categories | Abstract | PDF | Code |\n|:-----|:------|:-----------|:---------|:----|:----|\n";

/// Render the whole summary document
pub fn render_readme(catalog: &Catalog, repo: &str, today: NaiveDate) -> String {
    let stamp = today.format("%Y.%m.%d").to_string();
    let anchor = today.format("%Y%m%d").to_string();
    let topics: Vec<&str> = catalog.topics().map(|(name, _)| name.as_str()).collect();
    let tracked = if topics.is_empty() {
        "arXiv".to_string()
    } else {
        topics.join(", ")
    };

    let mut md = String::new();
    md.push_str(&format!("## Last updated on {}\n\n", stamp));

    md.push_str("\n## About\n");
    md.push_str(&format!("This repository tracks Arxiv papers on {}.\n", tracked));
    md.push_str("- **Seeding:** Initial population covers papers from the last 5 years (run with --seed).\n");
    md.push_str("- **Daily Updates:** Adds papers since the last run (stored in last_run.txt).\n");
    md.push_str("- **Backfill:** Edit last_run.txt to an earlier date to fetch missed papers.\n\n");

    for (topic, entries) in catalog.topics() {
        if entries.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", topic));
        md.push_str(TABLE_HEADER);

        let mut rows: Vec<&CatalogEntry> = entries.values().collect();
        rows.sort_by_key(|entry| std::cmp::Reverse(entry.sort_key()));
        for entry in rows {
            md.push_str(&entry.to_row());
        }

        md.push_str(&format!(
            "<p align=right>(<a href=#Updated-on-{}>back to top</a>)</p>\n\n",
            anchor
        ));
    }

    for (name, url) in shield_links(repo) {
        md.push_str(&format!("[{}]: {}\n", name, url));
    }

    md
}

/// Render and write the summary document to `path`
pub fn write_readme(path: &Path, catalog: &Catalog, repo: &str, today: NaiveDate) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_readme(catalog, repo, today))?;
    info!(path = %path.display(), "Markdown generated");
    Ok(())
}

fn shield_links(repo: &str) -> [(&'static str, String); 8] {
    [
        ("contributors-shield", format!("https://img.shields.io/github/contributors/{}.svg?style=for-the-badge", repo)),
        ("contributors-url", format!("https://github.com/{}/graphs/contributors", repo)),
        ("forks-shield", format!("https://img.shields.io/github/forks/{}.svg?style=for-the-badge", repo)),
        ("forks-url", format!("https://github.com/{}/network/members", repo)),
        ("stars-shield", format!("https://img.shields.io/github/stars/{}.svg?style=for-the-badge", repo)),
        ("stars-url", format!("https://github.com/{}/stargazers", repo)),
        ("issues-shield", format!("https://img.shields.io/github/issues/{}.svg?style=for-the-badge", repo)),
        ("issues-url", format!("https://github.com/{}/issues", repo)),
    ]
}

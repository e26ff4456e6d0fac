//! Detail page pipeline.
//!
//! One call to [`DetailPipeline::fetch`] walks a subject's page through
//!
//! ```text
//! idle -> page_acquired -> content_loaded -> sections_parsed -> assembled
//! ```
//!
//! Page acquisition (tab, navigation, waits, markup) is retried under the
//! configured policy; everything after it works on what was loaded and never
//! fails the fetch. The tab is closed on every path, the shared surface is
//! left running for the next subject.

use std::fmt;

use prts_core::{AppConfig, DetailRecord, Error};
use scraper::Html;

use crate::extract::{Sections, parse_sections};
use crate::fetch::article_url;
use crate::render::{Launcher, PageTab, RenderError, RenderPool, RenderSurface};
use crate::terms::{TermCandidate, TermExtractor, collect_candidates};

/// Element every loaded article carries.
pub const CONTENT_SELECTOR: &str = "#mw-content-text";

type TabOf<L> = <<L as Launcher>::Surface as RenderSurface>::Tab;

/// Progress of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    PageAcquired,
    ContentLoaded,
    SectionsParsed,
    Assembled,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::PageAcquired => "page_acquired",
            Stage::ContentLoaded => "content_loaded",
            Stage::SectionsParsed => "sections_parsed",
            Stage::Assembled => "assembled",
        };
        f.write_str(s)
    }
}

/// Sequences the section extractors over pages loaded from a shared pool.
pub struct DetailPipeline<'a, L: Launcher> {
    pool: &'a RenderPool<L>,
    config: &'a AppConfig,
}

impl<'a, L: Launcher> DetailPipeline<'a, L> {
    pub fn new(pool: &'a RenderPool<L>, config: &'a AppConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &RenderPool<L> {
        self.pool
    }

    /// Load, parse and assemble one subject's detail record.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidInput` for an empty subject name, before any browser
    ///   work.
    /// - `Error::InvalidUrl` if the configured base URL is unusable.
    /// - `Error::RenderFailed` once every page acquisition attempt failed.
    pub async fn fetch(&self, subject_name: &str) -> Result<DetailRecord, Error> {
        let subject_name = subject_name.trim();
        if subject_name.is_empty() {
            return Err(Error::InvalidInput("subject name is empty".into()));
        }
        let url = article_url(&self.config.base_url, subject_name)?;

        let mut stage = Stage::Idle;
        tracing::info!(subject = subject_name, %url, "fetching detail page");

        let (tab, markup) = self.acquire_page(url.as_str(), &mut stage).await?;

        let (sections, candidates) = parse_page(&markup, self.config.terms.min_length);
        advance(&mut stage, Stage::SectionsParsed);

        let extractor = TermExtractor::new(&self.config.terms, &self.config.waits, &self.config.timeouts);
        let (terms, tally) = extractor.extract(&tab, &candidates).await;
        close_tab(&tab).await;
        if tally.surface_lost {
            tracing::warn!(subject = subject_name, "render surface lost during term extraction, releasing it");
            self.pool.release_all().await;
        }

        let Sections { base_attributes, extra_attributes, characteristic, talents, skills } = sections;
        let record = DetailRecord {
            subject_name: subject_name.to_string(),
            source_url: url.to_string(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
            branch_name: characteristic.branch_name,
            branch_description: characteristic.branch_description,
            trait_details: characteristic.trait_details,
            base_attributes,
            extra_attributes,
            talents,
            skills,
            terms,
        };
        advance(&mut stage, Stage::Assembled);

        tracing::info!(
            subject = subject_name,
            tiers = record.base_attributes.populated().count(),
            talents = record.talents.len(),
            skills = record.skills.len(),
            terms = record.terms.len(),
            "detail record assembled"
        );
        Ok(record)
    }

    /// Open a tab and load `url` into it, retrying per the retry policy.
    async fn acquire_page(&self, url: &str, stage: &mut Stage) -> Result<(TabOf<L>, String), Error> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.load_once(url, stage).await {
                Ok(loaded) => return Ok(loaded),
                Err(e) => {
                    let fatal = e.is_fatal();
                    tracing::warn!(attempt, max_attempts, fatal, stage = %stage, "page load failed: {e}");
                    *stage = Stage::Idle;

                    if fatal {
                        self.pool.release_all().await;
                    }
                    if attempt < max_attempts {
                        let delay = if fatal { policy.crash_delay() } else { policy.retry_delay() };
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        tracing::error!(url, max_attempts, "giving up on page: {reason}");
        Err(Error::RenderFailed(format!("{url}: {max_attempts} attempts failed, last: {reason}")))
    }

    async fn load_once(&self, url: &str, stage: &mut Stage) -> Result<(TabOf<L>, String), RenderError> {
        let surface = self.pool.acquire().await?;
        let tab = surface.open_tab().await?;
        advance(stage, Stage::PageAcquired);

        match self.load_into(&tab, url).await {
            Ok(markup) => {
                advance(stage, Stage::ContentLoaded);
                Ok((tab, markup))
            }
            Err(e) => {
                close_tab(&tab).await;
                Err(e)
            }
        }
    }

    async fn load_into(&self, tab: &TabOf<L>, url: &str) -> Result<String, RenderError> {
        let timeouts = &self.config.timeouts;

        tab.goto(url, timeouts.page_load()).await?;
        tab.wait_for_selector(CONTENT_SELECTOR, timeouts.page_load()).await?;

        match tab.wait_for_network_idle(timeouts.network_idle()).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!("network idle wait ended early: {e}"),
        }
        tokio::time::sleep(self.config.waits.settle()).await;

        tab.content().await
    }
}

/// Parse the markup once and pull out everything that needs no pointer.
///
/// The parsed document is dropped before returning.
fn parse_page(markup: &str, term_min_length: usize) -> (Sections, Vec<TermCandidate>) {
    let doc = Html::parse_document(markup);
    (parse_sections(&doc), collect_candidates(&doc, term_min_length))
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "detail stage");
    *stage = next;
}

async fn close_tab<T: PageTab>(tab: &T) {
    if let Err(e) = tab.close().await {
        tracing::warn!("closing tab failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Idle.to_string(), "idle");
        assert_eq!(Stage::SectionsParsed.to_string(), "sections_parsed");
        assert_eq!(Stage::Assembled.to_string(), "assembled");
    }

    #[test]
    fn test_parse_page_collects_sections_and_candidates() {
        let markup = r#"<div id="mw-content-text">
            <table class="char-base-attr-table"><tr><th></th><th>精英2 满级</th></tr><tr><th>攻击</th><td>500</td></tr></table>
            <span class="mc-tooltips">法术脆弱</span>
        </div>"#;
        let (sections, candidates) = parse_page(markup, 2);
        assert_eq!(sections.base_attributes.populated().count(), 1);
        assert_eq!(candidates.len(), 1);
    }
}

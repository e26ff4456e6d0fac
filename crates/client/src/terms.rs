//! Glossary terms scraped from hover tooltips.
//!
//! Term spans are found in the parsed markup first, then hovered one by one
//! on the live page; the tooltip the wiki renders supplies the term's type
//! and description.

use std::collections::HashSet;
use std::sync::LazyLock;

use prts_core::GlossaryTerm;
use prts_core::config::{TermSettings, TimeoutSettings, WaitSettings};
use regex::Regex;
use scraper::Html;

use crate::extract::dom::selector;
use crate::extract::normalize::clean_text;
use crate::render::{HoverSurface, RenderError, TermLocator, TooltipContent};

/// Class fragment marking a span as a tooltip trigger.
pub const TOOLTIP_CLASS_MARKER: &str = "mc-tooltips";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A term span found in the page markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCandidate {
    pub name: String,
    /// First class of the span containing the tooltip marker.
    pub class: String,
}

/// Tooltip-bearing spans of `div#mw-content-text`, in document order.
///
/// Names shorter than `min_length` characters and purely numeric names are
/// skipped. Duplicates are kept; the extractor resolves them.
pub fn collect_candidates(doc: &Html, min_length: usize) -> Vec<TermCandidate> {
    let Some(content) = doc.select(&selector("div#mw-content-text")).next() else {
        tracing::warn!("content area not found, no glossary candidates");
        return Vec::new();
    };

    content
        .select(&selector("span[class]"))
        .filter_map(|span| {
            let class = span.value().classes().find(|c| c.contains(TOOLTIP_CLASS_MARKER))?.to_string();
            let name = clean_text(span);
            let long_enough = name.chars().count() >= min_length;
            let numeric = name.chars().all(char::is_numeric);
            (long_enough && !numeric).then_some(TermCandidate { name, class })
        })
        .collect()
}

/// Type label and description read from one tooltip.
///
/// Returns `None` when the description is shorter than `desc_min_length`
/// characters.
pub fn interpret_tooltip(
    term_name: &str, tooltip: &TooltipContent, desc_min_length: usize,
) -> Option<(String, String)> {
    let labels: Vec<&str> = tooltip
        .strong_texts
        .iter()
        .map(|t| {
            let head = t.trim().split(':').next().unwrap_or_default();
            head.trim_end_matches(['：', ':'])
        })
        .filter(|t| !t.is_empty())
        .collect();
    let mut term_type = labels.join("，");
    if term_type.is_empty() || term_type == term_name {
        term_type = GlossaryTerm::NO_TYPE.to_string();
    }

    let mut description = tooltip.other_texts.join("\n");
    if description.trim().is_empty() {
        description = tooltip.full_text.clone();
        if term_type != GlossaryTerm::NO_TYPE {
            description = description
                .replace(&format!("{term_type}："), "")
                .replace(&format!("{term_type}:"), "")
                .replace(&term_type, "");
        }
    }

    let description = WHITESPACE_RUN.replace_all(description.trim(), "\n").into_owned();
    if description.chars().count() < desc_min_length {
        return None;
    }
    Some((term_type, description))
}

/// Per-page tallies, logged when extraction ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermTally {
    pub candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unique: usize,
    /// The render surface died mid-extraction and must be relaunched.
    pub surface_lost: bool,
}

enum Attempt {
    Accepted(GlossaryTerm),
    Rejected(&'static str),
}

/// Hover-driven glossary extraction over one loaded page.
pub struct TermExtractor<'a> {
    terms: &'a TermSettings,
    waits: &'a WaitSettings,
    timeouts: &'a TimeoutSettings,
}

impl<'a> TermExtractor<'a> {
    pub fn new(terms: &'a TermSettings, waits: &'a WaitSettings, timeouts: &'a TimeoutSettings) -> Self {
        Self { terms, waits, timeouts }
    }

    /// Hover each candidate and keep the first successful reading per name.
    ///
    /// At most `max_terms` candidates are attempted. A fatal surface error
    /// ends the loop and returns what was gathered so far.
    pub async fn extract<S>(&self, surface: &S, candidates: &[TermCandidate]) -> (Vec<GlossaryTerm>, TermTally)
    where
        S: HoverSurface + ?Sized,
    {
        let mut tally = TermTally { candidates: candidates.len(), ..Default::default() };
        let mut accepted: Vec<GlossaryTerm> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        if candidates.is_empty() {
            return (accepted, tally);
        }
        if let Err(e) = surface.ping().await {
            tracing::error!("page is not responding, skipping glossary terms: {e}");
            tally.surface_lost = e.is_fatal();
            return (accepted, tally);
        }

        let mut attempted = 0;
        for (idx, candidate) in candidates.iter().enumerate() {
            if seen.contains(candidate.name.as_str()) {
                tracing::debug!(term = %candidate.name, "duplicate term skipped");
                continue;
            }
            if attempted >= self.terms.max_terms {
                tracing::info!(max = self.terms.max_terms, "term limit reached, skipping the rest");
                break;
            }
            attempted += 1;

            match self.attempt(surface, candidate).await {
                Ok(Attempt::Accepted(term)) => {
                    tracing::info!(
                        n = idx + 1,
                        term = %term.term_name,
                        term_type = %term.term_type,
                        chars = term.term_description.chars().count(),
                        "term extracted"
                    );
                    seen.insert(candidate.name.as_str());
                    accepted.push(term);
                    tally.succeeded += 1;
                    self.park_pointer(surface).await;
                }
                Ok(Attempt::Rejected(reason)) => {
                    tracing::info!(n = idx + 1, term = %candidate.name, reason, "term skipped");
                    tally.failed += 1;
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(term = %candidate.name, "render surface failed, stopping term extraction: {e}");
                    tally.failed += 1;
                    tally.surface_lost = true;
                    break;
                }
                Err(e) => {
                    tracing::info!(n = idx + 1, term = %candidate.name, "term failed: {e}");
                    tally.failed += 1;
                }
            }
        }

        tally.unique = accepted.len();
        tracing::info!(
            candidates = tally.candidates,
            succeeded = tally.succeeded,
            failed = tally.failed,
            unique = tally.unique,
            surface_lost = tally.surface_lost,
            "glossary term extraction finished"
        );
        (accepted, tally)
    }

    async fn attempt<S>(&self, surface: &S, candidate: &TermCandidate) -> Result<Attempt, RenderError>
    where
        S: HoverSurface + ?Sized,
    {
        let locator = TermLocator { class: candidate.class.clone(), text: candidate.name.clone() };
        let budget = self.timeouts.locator_wait();
        let matches = tokio::time::timeout(budget, surface.hover(&locator))
            .await
            .map_err(|_| RenderError::timeout(budget))??;
        match matches {
            0 => return Ok(Attempt::Rejected("element not found on live page")),
            1 => {}
            n => tracing::debug!(term = %candidate.name, matches = n, "several elements match, using the first"),
        }

        tokio::time::sleep(self.waits.tooltip_render()).await;

        let Some(tooltip) = self.find_tooltip(surface).await? else {
            return Ok(Attempt::Rejected("no tooltip rendered"));
        };

        Ok(match interpret_tooltip(&candidate.name, &tooltip, self.terms.desc_min_length) {
            Some((term_type, term_description)) => {
                Attempt::Accepted(GlossaryTerm { term_name: candidate.name.clone(), term_type, term_description })
            }
            None => Attempt::Rejected("description too short"),
        })
    }

    /// First tooltip container present, in configured selector order.
    async fn find_tooltip<S>(&self, surface: &S) -> Result<Option<TooltipContent>, RenderError>
    where
        S: HoverSurface + ?Sized,
    {
        let budget = self.timeouts.text_extract();
        for selector in &self.terms.tooltip_selectors {
            let found = tokio::time::timeout(budget, surface.query_tooltip(selector))
                .await
                .map_err(|_| RenderError::timeout(budget))??;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    async fn park_pointer<S>(&self, surface: &S)
    where
        S: HoverSurface + ?Sized,
    {
        if let Err(e) = surface.reset_pointer().await {
            tracing::warn!("moving pointer away failed: {e}");
        }
        tokio::time::sleep(self.waits.pointer_reset()).await;
    }
}

//! Static glossary page.
//!
//! Each entry is an empty anchor paragraph whose `id` is the term name,
//! followed by a paragraph holding the explanation.

use std::collections::HashSet;

use prts_core::StaticTerm;
use scraper::Html;

use super::dom::{is_tag, next_sibling_where, selector};
use super::normalize::{CleanOptions, clean_text_with};

const ANCHOR: &str = r#"div#mw-content-text p[style="margin:0;padding:0;"][id]"#;

pub fn parse_glossary(doc: &Html) -> Vec<StaticTerm> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    let opts = CleanOptions { line_breaks: true, ..Default::default() };

    for anchor in doc.select(&selector(ANCHOR)) {
        let name = anchor.value().attr("id").unwrap_or_default().trim();
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }

        let explanation = next_sibling_where(anchor, |e| is_tag(e, "p"))
            .map(|p| clean_text_with(p, opts))
            .unwrap_or_default();
        let explanation = explanation.replace(name, "").trim().to_string();

        terms.push(StaticTerm { term_name: name.to_string(), term_explanation: explanation });
    }

    tracing::info!(count = terms.len(), "parsed static glossary");
    terms
}

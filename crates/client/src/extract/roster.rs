//! Roster listing.
//!
//! The roster page keeps one `div` per operator under `div#filter-data`, with
//! every field stored in a `data-*` attribute.

use prts_core::{Error, RosterEntry};
use scraper::{ElementRef, Html};

use super::dom::{child_elements, is_tag, selector};

fn attr(el: ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().trim().to_string()
}

/// Displayed star count for the wiki's zero-based rarity.
///
/// A missing value counts as zero. Returns `None` for anything non-numeric.
pub fn display_rarity(raw: &str) -> Option<String> {
    let raw = if raw.is_empty() { "0" } else { raw };
    raw.parse::<u8>().ok().map(|r| (u16::from(r) + 1).to_string())
}

/// Parse the roster page.
///
/// # Errors
///
/// Returns `Error::LayoutChanged` when `div#filter-data` is missing.
pub fn parse_roster(doc: &Html) -> Result<Vec<RosterEntry>, Error> {
    let container = doc
        .select(&selector("div#filter-data"))
        .next()
        .ok_or_else(|| Error::LayoutChanged("roster container div#filter-data not found".into()))?;

    let mut entries = Vec::new();
    for node in child_elements(container).filter(|e| is_tag(*e, "div")) {
        let name = attr(node, "data-zh");
        let raw_rarity = attr(node, "data-rarity");
        let Some(rarity) = display_rarity(&raw_rarity) else {
            tracing::warn!(name, raw_rarity, "skipping roster entry with unreadable rarity");
            continue;
        };

        entries.push(RosterEntry {
            name,
            rarity,
            profession: attr(node, "data-profession"),
            sub_profession: attr(node, "data-subprofession"),
            faction: attr(node, "data-logo"),
            gender: attr(node, "data-sex"),
            position: attr(node, "data-position"),
            tags: attr(node, "data-tag"),
        });
    }

    tracing::info!(count = entries.len(), "parsed roster");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rarity() {
        assert_eq!(display_rarity("0").as_deref(), Some("1"));
        assert_eq!(display_rarity("5").as_deref(), Some("6"));
        assert_eq!(display_rarity("").as_deref(), Some("1"));
        assert_eq!(display_rarity("x"), None);
    }

    #[test]
    fn test_parse_roster() {
        let doc = Html::parse_document(
            r#"<div id="filter-data">
                 <div data-zh="能天使" data-rarity="5" data-profession="狙击" data-subprofession="速射手"
                      data-logo="企鹅物流" data-sex="女" data-position="远程位" data-tag="输出 "></div>
                 <div data-zh="芬" data-profession="先锋"></div>
                 <div data-zh="坏数据" data-rarity="?"></div>
                 <span data-zh="不是干员"></span>
               </div>"#,
        );
        let roster = parse_roster(&doc).unwrap();
        assert_eq!(roster.len(), 2);

        assert_eq!(roster[0].name, "能天使");
        assert_eq!(roster[0].rarity, "6");
        assert_eq!(roster[0].sub_profession, "速射手");
        assert_eq!(roster[0].faction, "企鹅物流");
        assert_eq!(roster[0].tags, "输出");

        assert_eq!(roster[1].rarity, "1");
        assert_eq!(roster[1].gender, "");
    }

    #[test]
    fn test_parse_roster_missing_container() {
        let err = parse_roster(&Html::parse_document("<div></div>")).unwrap_err();
        assert!(matches!(err, Error::LayoutChanged(_)));
    }
}

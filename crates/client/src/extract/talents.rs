//! Talent tables.
//!
//! The wiki renders each talent as a fixed template:
//!
//! ```text
//! row 0         header
//! rows 1..n-2   one unlock condition per row: name | trigger | description spans
//! row n-2       "备注" header (optional)
//! row n-1       remarks text
//! ```
//!
//! Rows are interpreted by position only.

use prts_core::{Talent, TalentDetail, TalentType};
use scraper::{ElementRef, Html};

use super::dom::{data_cells, has_class, has_header_cell, is_tag, next_in_document, next_sibling_where, rows, selector};
use super::normalize::{clean_desc, clean_text};

fn span_prefix(talent_type: TalentType) -> &'static str {
    match talent_type {
        TalentType::First => "第一天赋",
        TalentType::Second => "第二天赋",
    }
}

fn is_talent_table(el: ElementRef<'_>) -> bool {
    is_tag(el, "table") && has_class(el, "wikitable")
}

/// First span under `cell` carrying `class`.
fn span_with_class<'a>(cell: ElementRef<'a>, class: &str) -> Option<ElementRef<'a>> {
    cell.select(&selector("span")).find(|s| has_class(*s, class))
}

/// Up to two talents following the `span#天赋` anchor.
pub fn parse_talents(doc: &Html) -> Vec<Talent> {
    let Some(anchor) = doc.select(&selector(r#"span[id="天赋"]"#)).next() else {
        tracing::debug!("talent section not found");
        return Vec::new();
    };

    let first = next_in_document(anchor, is_talent_table);
    let second = first.and_then(|t| next_sibling_where(t, is_talent_table));

    let talents: Vec<Talent> = [(first, TalentType::First), (second, TalentType::Second)]
        .into_iter()
        .filter_map(|(table, talent_type)| table.and_then(|t| parse_talent_table(t, talent_type)))
        .collect();

    tracing::debug!(count = talents.len(), "parsed talents");
    talents
}

/// Walk one talent table. Returns `None` when neither a name nor any detail
/// row was found.
pub fn parse_talent_table(table: ElementRef<'_>, talent_type: TalentType) -> Option<Talent> {
    let prefix = span_prefix(talent_type);
    let desc_class = format!("{prefix}潜能_1");
    let potential_class = format!("{prefix}潜能_2");

    let mut talent = Talent { talent_type, talent_name: String::new(), remarks: String::new(), details: Vec::new() };
    let table_rows = rows(table);
    let remark_header = table_rows.len().checked_sub(2);
    let mut in_remarks = false;

    for (idx, row) in table_rows.iter().enumerate().skip(1) {
        if Some(idx) == remark_header && has_header_cell(*row) {
            in_remarks = true;
            continue;
        }
        let cells = data_cells(*row);
        if cells.is_empty() {
            continue;
        }
        if in_remarks {
            talent.remarks = clean_text(cells[0]);
            break;
        }

        let name = clean_text(cells[0]);
        if talent.talent_name.is_empty() && !name.is_empty() {
            talent.talent_name = name;
        }

        let body = cells.get(2).copied();
        talent.details.push(TalentDetail {
            trigger_condition: clean_text(cells.get(1).copied()),
            description: clean_desc(body.and_then(|c| span_with_class(c, &desc_class))),
            potential_enhancement: clean_desc(body.and_then(|c| span_with_class(c, &potential_class))),
        });
    }

    if talent.talent_name.is_empty() && talent.details.is_empty() {
        tracing::debug!(talent_type = talent_type.as_str(), "talent table had no content");
        return None;
    }
    Some(talent)
}

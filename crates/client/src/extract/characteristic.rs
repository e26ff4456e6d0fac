//! Branch and trait table.

use scraper::Html;

use super::dom::{data_cells, next_sibling_where, rows, selector};
use super::normalize::{clean_desc, clean_text};

/// Row marker preceding the trait detail list.
const BRANCH_INFO_MARKER: &str = "分支信息";

/// Branch name, branch description and trait details of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Characteristic {
    pub branch_name: String,
    pub branch_description: String,
    pub trait_details: String,
}

pub fn parse_characteristic(doc: &Html) -> Characteristic {
    let mut out = Characteristic::default();
    let Some(table) = doc.select(&selector("table.wikitable.logo")).next() else {
        tracing::debug!("trait table not found");
        return out;
    };

    let table_rows = rows(table);
    if let Some(row) = table_rows.get(1) {
        let cells = data_cells(*row);
        out.branch_name = clean_text(cells.first().copied());
        out.branch_description = clean_text(cells.get(1).copied());
    }

    let marker = table_rows
        .iter()
        .find(|row| row.text().any(|t| t.contains(BRANCH_INFO_MARKER)));
    if let Some(next) = marker.and_then(|row| next_sibling_where(*row, |e| e.value().name() == "tr")) {
        let li = selector("li");
        out.trait_details = next.select(&li).map(clean_desc).collect::<Vec<_>>().concat();
    }

    out
}

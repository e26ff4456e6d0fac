//! Base-stat and extra-attribute tables.

use prts_core::{BaseAttributes, ExtraAttributes, ExtraField, Tier};
use scraper::Html;

use super::dom::{all_cells, data_cells, rows, selector};
use super::normalize::clean_text;

/// Header substrings that classify a base-table column.
const TIER_HEADERS: &[(&str, Tier)] = &[
    ("精英0 1级", Tier::Elite0Level1),
    ("精英0 满级", Tier::Elite0Max),
    ("精英1 满级", Tier::Elite1Max),
    ("精英2 满级", Tier::Elite2Max),
    ("信赖加成上限", Tier::TrustBonus),
];

const ATTR_LABELS: &[(&str, &str)] =
    &[("生命上限", "max_hp"), ("攻击", "atk"), ("防御", "def"), ("法术抗性", "res")];

/// Extra-table headers, matched by containment in this order.
const EXTRA_HEADERS: &[(&str, ExtraField)] = &[
    ("再部署时间", ExtraField::RedeploymentTime),
    ("初始部署费用", ExtraField::InitialDeploymentCost),
    ("攻击间隔", ExtraField::AttackInterval),
    ("阻挡数", ExtraField::BlockCount),
    ("所属势力", ExtraField::Faction),
    ("隐藏势力", ExtraField::HiddenFaction),
];

const QUOTES: &[char] = &['"', '“', '”'];

fn classify_tier(header: &str) -> Option<Tier> {
    TIER_HEADERS
        .iter()
        .find(|(needle, _)| header.contains(needle))
        .map(|(_, tier)| *tier)
}

fn attr_key(label: &str) -> String {
    ATTR_LABELS
        .iter()
        .find(|(cn, _)| *cn == label)
        .map_or_else(|| label.to_lowercase(), |(_, key)| (*key).to_string())
}

/// Read `table.char-base-attr-table`. A missing table yields five empty tiers.
pub fn parse_base_attributes(doc: &Html) -> BaseAttributes {
    let mut attrs = BaseAttributes::default();
    let Some(table) = doc.select(&selector("table.char-base-attr-table")).next() else {
        tracing::debug!("base attribute table not found");
        return attrs;
    };

    let table_rows = rows(table);
    let Some((header, body)) = table_rows.split_first() else {
        return attrs;
    };

    let columns: Vec<Option<Tier>> = all_cells(*header)
        .into_iter()
        .map(|cell| classify_tier(&clean_text(cell)))
        .collect();

    for row in body {
        let cells: Vec<String> = all_cells(*row).into_iter().map(clean_text).collect();
        if cells.len() < 2 {
            continue;
        }
        let key = attr_key(&cells[0]);
        for (idx, value) in cells.iter().enumerate().skip(1) {
            if let Some(Some(tier)) = columns.get(idx) {
                attrs.set(*tier, key.clone(), value.clone());
            }
        }
    }

    tracing::debug!(tiers = attrs.populated().count(), "parsed base attributes");
    attrs
}

/// Read `table.char-extra-attr-table`. Unknown headers are skipped.
pub fn parse_extra_attributes(doc: &Html) -> ExtraAttributes {
    let mut extra = ExtraAttributes::default();
    let Some(table) = doc.select(&selector("table.char-extra-attr-table")).next() else {
        tracing::debug!("extra attribute table not found");
        return extra;
    };

    let th = selector("th");
    for row in rows(table) {
        let (Some(header), Some(value)) = (row.select(&th).next(), data_cells(row).into_iter().next()) else {
            continue;
        };
        let label = clean_text(header).replace(QUOTES, "");
        let label = label.trim();
        if let Some((_, field)) = EXTRA_HEADERS.iter().find(|(needle, _)| label.contains(needle)) {
            extra.set(*field, clean_text(value));
        }
    }

    extra
}

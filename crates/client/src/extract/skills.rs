//! Skill tables.
//!
//! Each skill table follows one template: row 0 carries the name and the
//! skill type tags, the level rows follow, and a header-bearing
//! second-to-last row introduces a trailing remark row. Only two level rows
//! are sampled, at fixed positions.

use prts_core::{Skill, SkillLevel};
use scraper::{ElementRef, Html, Node};

use super::dom::{ancestor_tag, data_cells, has_class, has_header_cell, is_tag, next_sibling_where, rows, selector};
use super::normalize::{CleanOptions, clean_text, clean_text_with, is_hidden};

/// Row of the last level before masteries.
pub const MAX_LEVEL_ROW: usize = 8;
/// Row of the sampled mastery level.
pub const MASTERY_ROW: usize = 11;
/// Level rows need at least this many cells.
const LEVEL_CELLS: usize = 5;
/// A page lists at most this many skills.
const MAX_SKILLS: u32 = 3;
const SKILL_TABLE_CLASSES: &[&str] = &["wikitable", "nomobile", "logo"];

fn is_skill_table(el: ElementRef<'_>) -> bool {
    is_tag(el, "table") && SKILL_TABLE_CLASSES.iter().all(|c| has_class(el, c))
}

fn is_paragraph(el: ElementRef<'_>) -> bool {
    is_tag(el, "p")
}

/// Locate the skill tables under the `span#技能` heading.
///
/// Each `p` following the heading that mentions "技能" introduces one table;
/// the walk stops at the first `p` that does not.
fn find_skill_tables(doc: &Html) -> Vec<ElementRef<'_>> {
    let mut tables = Vec::new();
    let Some(anchor) = doc.select(&selector(r#"span[id="技能"]"#)).next() else {
        tracing::debug!("skill section not found");
        return tables;
    };
    let Some(heading) = ancestor_tag(anchor, "h2") else {
        tracing::debug!("skill anchor is not inside an h2");
        return tables;
    };

    let mut marker = next_sibling_where(heading, is_paragraph);
    for n in 1..=MAX_SKILLS {
        let Some(p) = marker else {
            tracing::debug!(n, "no marker paragraph for skill table");
            break;
        };
        if !clean_text(p).contains("技能") {
            tracing::debug!(n, "marker paragraph does not name a skill, stopping");
            break;
        }
        match next_sibling_where(p, |e| is_tag(e, "table")) {
            Some(table) if is_skill_table(table) => tables.push(table),
            _ => tracing::debug!(n, "table after marker is not a skill table"),
        }
        marker = next_sibling_where(p, is_paragraph);
    }

    tables
}

/// Description text of a level cell: visible top-level text plus visible
/// top-level spans, space-joined.
fn visible_text(cell: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for child in cell.children() {
        match child.value() {
            Node::Text(t) => {
                let trimmed = t.text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(e) if e.name() == "span" => {
                let Some(span) = ElementRef::wrap(child) else { continue };
                if is_hidden(span) {
                    continue;
                }
                let text = clean_text_with(span, CleanOptions { skip_hidden: true, ..Default::default() });
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            _ => {}
        }
    }
    parts.join(" ")
}

fn parse_level(cells: &[ElementRef<'_>]) -> SkillLevel {
    SkillLevel {
        level: clean_text(cells[0]),
        description: visible_text(cells[1]),
        initial_sp: clean_text(cells[2]),
        sp_cost: clean_text(cells[3]),
        duration: clean_text(cells[4]),
    }
}

/// Read one skill table. `number` is the 1-based position on the page.
pub fn parse_skill_table(table: ElementRef<'_>, number: u32) -> Skill {
    let mut skill = Skill {
        skill_number: number,
        skill_name: String::new(),
        skill_type: String::new(),
        unlock_condition: format!("精英{number}"),
        remark: String::new(),
        skill_levels: Vec::new(),
    };

    let table_rows = rows(table);
    let remark_header = table_rows.len().checked_sub(2);
    let mut in_remark = false;

    for (idx, row) in table_rows.iter().enumerate() {
        let cells = data_cells(*row);

        if idx == 0 {
            if let Some(name_cell) = cells.get(1) {
                let big = name_cell.select(&selector("big")).next();
                skill.skill_name = clean_text(big.unwrap_or(*name_cell));
            }
            if let Some(type_cell) = cells.get(2) {
                let tags: Vec<String> = type_cell
                    .select(&selector("span"))
                    .filter(|s| has_class(*s, "mc-tooltips"))
                    .map(clean_text)
                    .filter(|t| !t.is_empty())
                    .collect();
                skill.skill_type = tags.join("|");
            }
            continue;
        }

        if idx == MAX_LEVEL_ROW || idx == MASTERY_ROW {
            if cells.len() >= LEVEL_CELLS {
                skill.skill_levels.push(parse_level(&cells));
            }
            continue;
        }

        if Some(idx) == remark_header && has_header_cell(*row) {
            in_remark = true;
            continue;
        }
        if in_remark {
            if let Some(first) = cells.first() {
                skill.remark = clean_text(*first);
                break;
            }
        }
    }

    skill
}

/// Up to three named skills, numbered by table position.
pub fn parse_skills(doc: &Html) -> Vec<Skill> {
    let skills: Vec<Skill> = find_skill_tables(doc)
        .into_iter()
        .zip(1..)
        .map(|(table, number)| parse_skill_table(table, number))
        .filter(|skill| !skill.skill_name.is_empty())
        .collect();

    tracing::debug!(count = skills.len(), "parsed skills");
    skills
}

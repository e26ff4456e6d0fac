//! Section extractors for wiki markup.
//!
//! Every extractor is a pure function over a parsed [`scraper::Html`]
//! document: no I/O, no awaits, and a missing section yields an empty value
//! rather than an error. The only exception is the roster, whose container is
//! required.
//!
//! ### Detail page sections
//! - Base and extra attribute tables
//! - Branch and trait table
//! - Talent tables (0 to 2)
//! - Skill tables (0 to 3)
//!
//! ### Listing pages
//! - Roster (`div#filter-data`)
//! - Static glossary

pub mod attributes;
pub mod characteristic;
pub(crate) mod dom;
pub mod glossary;
pub mod normalize;
pub mod roster;
pub mod skills;
pub mod talents;

pub use attributes::{parse_base_attributes, parse_extra_attributes};
pub use characteristic::{Characteristic, parse_characteristic};
pub use glossary::parse_glossary;
pub use normalize::{CleanOptions, Fragment, clean_desc, clean_text, clean_text_with};
pub use roster::parse_roster;
pub use skills::parse_skills;
pub use talents::parse_talents;

use prts_core::{BaseAttributes, ExtraAttributes, Skill, Talent};
use scraper::Html;

/// Everything a detail page yields without pointer interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub base_attributes: BaseAttributes,
    pub extra_attributes: ExtraAttributes,
    pub characteristic: Characteristic,
    pub talents: Vec<Talent>,
    pub skills: Vec<Skill>,
}

/// Run the section extractors in page order: attributes, trait, talents,
/// skills.
pub fn parse_sections(doc: &Html) -> Sections {
    let base_attributes = parse_base_attributes(doc);
    let extra_attributes = parse_extra_attributes(doc);
    let characteristic = parse_characteristic(doc);
    let talents = parse_talents(doc);
    let skills = parse_skills(doc);

    Sections { base_attributes, extra_attributes, characteristic, talents, skills }
}

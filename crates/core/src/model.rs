//! Normalized records produced by the scrapers and consumed by the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Elite promotion stage a base attribute column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[serde(rename = "elite_0_level_1")]
    Elite0Level1,
    #[serde(rename = "elite_0_max")]
    Elite0Max,
    #[serde(rename = "elite_1_max")]
    Elite1Max,
    #[serde(rename = "elite_2_max")]
    Elite2Max,
    TrustBonus,
}

impl Tier {
    pub const ALL: [Tier; 5] =
        [Tier::Elite0Level1, Tier::Elite0Max, Tier::Elite1Max, Tier::Elite2Max, Tier::TrustBonus];

    /// Storage key, also used as the serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Elite0Level1 => "elite_0_level_1",
            Tier::Elite0Max => "elite_0_max",
            Tier::Elite1Max => "elite_1_max",
            Tier::Elite2Max => "elite_2_max",
            Tier::TrustBonus => "trust_bonus",
        }
    }
}

/// Attribute values for one tier, keyed by canonical attribute name
/// (`max_hp`, `atk`, `def`, `res`, or a lowercased raw label).
pub type TierValues = BTreeMap<String, String>;

/// Base attributes for every tier.
///
/// All five tiers are always present; a tier the page does not list keeps an
/// empty value map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAttributes(pub BTreeMap<Tier, TierValues>);

impl Default for BaseAttributes {
    fn default() -> Self {
        Self(Tier::ALL.into_iter().map(|tier| (tier, TierValues::new())).collect())
    }
}

impl BaseAttributes {
    pub fn get(&self, tier: Tier) -> Option<&TierValues> {
        self.0.get(&tier)
    }

    pub fn set(&mut self, tier: Tier, attr: impl Into<String>, value: impl Into<String>) {
        self.0.entry(tier).or_default().insert(attr.into(), value.into());
    }

    /// Tiers that carry at least one value.
    pub fn populated(&self) -> impl Iterator<Item = (Tier, &TierValues)> {
        self.0.iter().filter(|(_, values)| !values.is_empty()).map(|(tier, values)| (*tier, values))
    }
}

/// Field of the extra attributes table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraField {
    RedeploymentTime,
    InitialDeploymentCost,
    AttackInterval,
    BlockCount,
    Faction,
    HiddenFaction,
}

/// Extra attributes (redeploy time, cost, faction, block count, ...).
///
/// Values stay as the wiki prints them, e.g. `"15→17"` for a cost that
/// changes with promotion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraAttributes {
    pub redeployment_time: Option<String>,
    pub initial_deployment_cost: Option<String>,
    pub attack_interval: Option<String>,
    pub block_count: Option<String>,
    pub faction: Option<String>,
    pub hidden_faction: Option<String>,
}

impl ExtraAttributes {
    pub fn set(&mut self, field: ExtraField, value: String) {
        let slot = match field {
            ExtraField::RedeploymentTime => &mut self.redeployment_time,
            ExtraField::InitialDeploymentCost => &mut self.initial_deployment_cost,
            ExtraField::AttackInterval => &mut self.attack_interval,
            ExtraField::BlockCount => &mut self.block_count,
            ExtraField::Faction => &mut self.faction,
            ExtraField::HiddenFaction => &mut self.hidden_faction,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which of the two talent slots a talent occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TalentType {
    First,
    Second,
}

impl TalentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TalentType::First => "first",
            TalentType::Second => "second",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentDetail {
    pub trigger_condition: String,
    pub description: String,
    pub potential_enhancement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Talent {
    pub talent_type: TalentType,
    pub talent_name: String,
    pub remarks: String,
    pub details: Vec<TalentDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevel {
    pub level: String,
    pub description: String,
    pub initial_sp: String,
    pub sp_cost: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// 1-based position of the skill on the page.
    pub skill_number: u32,
    pub skill_name: String,
    /// Pipe-joined tooltip labels, e.g. `"自动回复|手动触发"`.
    pub skill_type: String,
    pub unlock_condition: String,
    pub remark: String,
    pub skill_levels: Vec<SkillLevel>,
}

/// A glossary term scraped from a hover tooltip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term_name: String,
    /// Tooltip type label, or [`GlossaryTerm::NO_TYPE`].
    pub term_type: String,
    pub term_description: String,
}

impl GlossaryTerm {
    pub const NO_TYPE: &'static str = "none";
}

/// Everything extracted from one subject's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub subject_name: String,
    pub source_url: String,
    pub fetched_at: String,
    pub branch_name: String,
    pub branch_description: String,
    pub trait_details: String,
    pub base_attributes: BaseAttributes,
    pub extra_attributes: ExtraAttributes,
    pub talents: Vec<Talent>,
    pub skills: Vec<Skill>,
    pub terms: Vec<GlossaryTerm>,
}

/// One row of the roster listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    /// Display rarity, `"1"` through `"6"`.
    pub rarity: String,
    pub profession: String,
    pub sub_profession: String,
    pub faction: String,
    pub gender: String,
    pub position: String,
    pub tags: String,
}

/// A term from the static glossary page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticTerm {
    pub term_name: String,
    pub term_explanation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_attributes_default_has_all_tiers() {
        let attrs = BaseAttributes::default();
        assert_eq!(attrs.0.len(), 5);
        assert!(Tier::ALL.iter().all(|t| attrs.get(*t).is_some_and(|v| v.is_empty())));
        assert_eq!(attrs.populated().count(), 0);
    }

    #[test]
    fn test_base_attributes_populated() {
        let mut attrs = BaseAttributes::default();
        attrs.set(Tier::Elite2Max, "atk", "480");
        let populated: Vec<_> = attrs.populated().map(|(t, _)| t).collect();
        assert_eq!(populated, vec![Tier::Elite2Max]);
    }

    #[test]
    fn test_tier_serializes_as_storage_key() {
        for tier in Tier::ALL {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier.as_str()));
        }
    }

    #[test]
    fn test_extra_attributes_set() {
        let mut extra = ExtraAttributes::default();
        assert!(extra.is_empty());
        extra.set(ExtraField::InitialDeploymentCost, "15→17".into());
        assert_eq!(extra.initial_deployment_cost.as_deref(), Some("15→17"));
        assert!(!extra.is_empty());
    }
}

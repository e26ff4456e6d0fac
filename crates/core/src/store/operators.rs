//! Per-subject writes: base info, attributes, talents, skills, term relations.

use super::connection::OperatorDb;
use crate::Error;
use crate::model::{BaseAttributes, DetailRecord, GlossaryTerm, RosterEntry, Skill, Talent};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Relation module recorded for terms scraped from a detail page. Tooltips
/// are not attributed to a single section, so one label covers them all.
pub const TERM_RELATION_MODULE: &str = "技能/天赋";

/// Row counts stored for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailSummary {
    pub branch_description: String,
    pub faction: String,
    pub attr_rows: i64,
    pub talents: i64,
    pub talent_details: i64,
    pub skills: i64,
    pub skill_levels: i64,
    pub term_relations: i64,
}

impl OperatorDb {
    /// Insert or update roster rows keyed by name.
    ///
    /// Only the roster columns are touched; detail columns written by
    /// [`OperatorDb::upsert_detail_base`] survive a roster resync.
    pub async fn upsert_roster(&self, entries: &[RosterEntry]) -> Result<usize, Error> {
        let entries = entries.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO operator_base (
                            name_cn, rarity, profession, sub_profession, faction,
                            gender, position, tags, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        ON CONFLICT(name_cn) DO UPDATE SET
                            rarity = excluded.rarity,
                            profession = excluded.profession,
                            sub_profession = excluded.sub_profession,
                            faction = excluded.faction,
                            gender = excluded.gender,
                            position = excluded.position,
                            tags = excluded.tags,
                            updated_at = excluded.updated_at",
                    )?;
                    for e in &entries {
                        stmt.execute(params![
                            &e.name,
                            &e.rarity,
                            &e.profession,
                            &e.sub_profession,
                            &e.faction,
                            &e.gender,
                            &e.position,
                            &e.tags,
                            &now,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or update the detail-page columns of a subject's base row.
    ///
    /// Sub-profession and faction from the roster take precedence; the
    /// detail page only fills them when the roster left them empty.
    pub async fn upsert_detail_base(&self, record: &DetailRecord) -> Result<(), Error> {
        let r = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let extra = &r.extra_attributes;
                conn.execute(
                    "INSERT INTO operator_base (
                        name_cn, sub_profession, faction, hidden_faction,
                        branch_description, trait_details, redeployment_time,
                        initial_deployment_cost, block_count, attack_interval,
                        detail_source, detail_fetched_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    ON CONFLICT(name_cn) DO UPDATE SET
                        sub_profession = CASE WHEN operator_base.sub_profession = ''
                            THEN excluded.sub_profession ELSE operator_base.sub_profession END,
                        faction = CASE WHEN operator_base.faction = ''
                            THEN excluded.faction ELSE operator_base.faction END,
                        hidden_faction = excluded.hidden_faction,
                        branch_description = excluded.branch_description,
                        trait_details = excluded.trait_details,
                        redeployment_time = excluded.redeployment_time,
                        initial_deployment_cost = excluded.initial_deployment_cost,
                        block_count = excluded.block_count,
                        attack_interval = excluded.attack_interval,
                        detail_source = excluded.detail_source,
                        detail_fetched_at = excluded.detail_fetched_at,
                        updated_at = excluded.updated_at",
                    params![
                        &r.subject_name,
                        &r.branch_name,
                        extra.faction.as_deref().unwrap_or_default(),
                        extra.hidden_faction.as_deref().unwrap_or_default(),
                        &r.branch_description,
                        &r.trait_details,
                        extra.redeployment_time.as_deref().unwrap_or_default(),
                        extra.initial_deployment_cost.as_deref().unwrap_or_default(),
                        extra.block_count.as_deref().unwrap_or_default(),
                        extra.attack_interval.as_deref().unwrap_or_default(),
                        &r.source_url,
                        &r.fetched_at,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Replace a subject's attribute rows. Tiers without values are not stored.
    ///
    /// Returns the number of rows written.
    pub async fn replace_attributes(&self, name: &str, attributes: &BaseAttributes) -> Result<usize, Error> {
        let name = name.to_string();
        let rows: Vec<(String, [String; 4])> = attributes
            .populated()
            .map(|(tier, values)| {
                let get = |key: &str| values.get(key).cloned().unwrap_or_default();
                (tier.as_str().to_string(), [get("max_hp"), get("atk"), get("def"), get("res")])
            })
            .collect();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM operator_attr WHERE name_cn = ?1", params![&name])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO operator_attr (name_cn, attr_type, max_hp, atk, def, res)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for (tier, [max_hp, atk, def, res]) in &rows {
                        stmt.execute(params![&name, tier, max_hp, atk, def, res])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Replace a subject's talents and their detail rows.
    pub async fn replace_talents(&self, name: &str, talents: &[Talent]) -> Result<usize, Error> {
        let name = name.to_string();
        let talents = talents.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                // details go with their talent through ON DELETE CASCADE
                tx.execute("DELETE FROM operator_talent WHERE name_cn = ?1", params![&name])?;
                for talent in &talents {
                    tx.execute(
                        "INSERT INTO operator_talent (name_cn, talent_type, talent_name, remarks)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![&name, talent.talent_type.as_str(), &talent.talent_name, &talent.remarks],
                    )?;
                    let talent_id = tx.last_insert_rowid();
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO operator_talent_detail (
                            talent_id, trigger_condition, description, potential_enhancement
                        ) VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for d in &talent.details {
                        stmt.execute(params![
                            talent_id,
                            &d.trigger_condition,
                            &d.description,
                            &d.potential_enhancement
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(talents.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Replace a subject's skills and their sampled level rows.
    pub async fn replace_skills(&self, name: &str, skills: &[Skill]) -> Result<usize, Error> {
        let name = name.to_string();
        let skills = skills.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM operator_skill WHERE name_cn = ?1", params![&name])?;
                for skill in &skills {
                    tx.execute(
                        "INSERT INTO operator_skill (
                            name_cn, skill_number, skill_name, skill_type, unlock_condition, remark
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            &name,
                            skill.skill_number,
                            &skill.skill_name,
                            &skill.skill_type,
                            &skill.unlock_condition,
                            &skill.remark,
                        ],
                    )?;
                    let skill_id = tx.last_insert_rowid();
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO operator_skill_level (
                            skill_id, level, description, initial_sp, sp_cost, duration
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for l in &skill.skill_levels {
                        stmt.execute(params![
                            skill_id,
                            &l.level,
                            &l.description,
                            &l.initial_sp,
                            &l.sp_cost,
                            &l.duration
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(skills.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Replace the terms linked to a subject.
    pub async fn replace_term_relations(&self, name: &str, terms: &[GlossaryTerm]) -> Result<usize, Error> {
        let name = name.to_string();
        let term_names: Vec<String> = terms.iter().map(|t| t.term_name.clone()).collect();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM operator_term_relation WHERE name_cn = ?1", params![&name])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO operator_term_relation (name_cn, term_name, relation_module, module_id)
                         VALUES (?1, ?2, ?3, '')",
                    )?;
                    for term in &term_names {
                        stmt.execute(params![&name, term, TERM_RELATION_MODULE])?;
                    }
                }
                tx.commit()?;
                Ok(term_names.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every subject in the store, ordered by rarity (highest
    /// first) then name.
    pub async fn list_operator_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT name_cn FROM operator_base
                     ORDER BY CAST(NULLIF(rarity, '') AS INTEGER) DESC, name_cn ASC",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Read back what is stored for one subject.
    ///
    /// Returns None if the subject has no base row.
    pub async fn load_detail_summary(&self, name: &str) -> Result<Option<DetailSummary>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<DetailSummary>, Error> {
                let base = conn.query_row(
                    "SELECT branch_description, faction FROM operator_base WHERE name_cn = ?1",
                    params![&name],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                );
                let (branch_description, faction) = match base {
                    Ok(b) => b,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let count = |sql: &str| -> Result<i64, rusqlite::Error> {
                    conn.query_row(sql, params![&name], |row| row.get(0))
                };

                Ok(Some(DetailSummary {
                    branch_description,
                    faction,
                    attr_rows: count("SELECT COUNT(*) FROM operator_attr WHERE name_cn = ?1")?,
                    talents: count("SELECT COUNT(*) FROM operator_talent WHERE name_cn = ?1")?,
                    talent_details: count(
                        "SELECT COUNT(*) FROM operator_talent_detail d
                         JOIN operator_talent t ON t.id = d.talent_id WHERE t.name_cn = ?1",
                    )?,
                    skills: count("SELECT COUNT(*) FROM operator_skill WHERE name_cn = ?1")?,
                    skill_levels: count(
                        "SELECT COUNT(*) FROM operator_skill_level l
                         JOIN operator_skill s ON s.id = l.skill_id WHERE s.name_cn = ?1",
                    )?,
                    term_relations: count("SELECT COUNT(*) FROM operator_term_relation WHERE name_cn = ?1")?,
                }))
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtraAttributes, SkillLevel, TalentDetail, TalentType, Tier};

    fn make_record(name: &str) -> DetailRecord {
        let mut base = BaseAttributes::default();
        base.set(Tier::Elite0Level1, "max_hp", "868");
        base.set(Tier::Elite2Max, "atk", "480");

        DetailRecord {
            subject_name: name.to_string(),
            source_url: format!("https://prts.wiki/w/{name}"),
            fetched_at: chrono::Utc::now().to_rfc3339(),
            branch_name: "咒愈师".to_string(),
            branch_description: "攻击造成法术伤害".to_string(),
            trait_details: "治疗量不受目标伤害减免影响".to_string(),
            base_attributes: base,
            extra_attributes: ExtraAttributes {
                faction: Some("维多利亚".to_string()),
                initial_deployment_cost: Some("15→17".to_string()),
                ..Default::default()
            },
            talents: vec![Talent {
                talent_type: TalentType::First,
                talent_name: "灼痕".to_string(),
                remarks: String::new(),
                details: vec![TalentDetail::default(), TalentDetail::default()],
            }],
            skills: vec![Skill {
                skill_number: 1,
                skill_name: "迅捷打击·γ型".to_string(),
                skill_type: "自动回复|手动触发".to_string(),
                unlock_condition: "精英1".to_string(),
                remark: String::new(),
                skill_levels: vec![SkillLevel::default(), SkillLevel::default()],
            }],
            terms: vec![GlossaryTerm {
                term_name: "法术脆弱".to_string(),
                term_type: "异常效果".to_string(),
                term_description: "受到的法术伤害提升".to_string(),
            }],
        }
    }

    async fn store(db: &OperatorDb, record: &DetailRecord) {
        let name = &record.subject_name;
        db.upsert_detail_base(record).await.unwrap();
        db.replace_attributes(name, &record.base_attributes).await.unwrap();
        db.replace_talents(name, &record.talents).await.unwrap();
        db.replace_skills(name, &record.skills).await.unwrap();
        db.replace_term_relations(name, &record.terms).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_and_summarize_detail() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        let record = make_record("焰影苇草");
        store(&db, &record).await;

        let summary = db.load_detail_summary("焰影苇草").await.unwrap().unwrap();
        assert_eq!(summary.branch_description, "攻击造成法术伤害");
        assert_eq!(summary.faction, "维多利亚");
        assert_eq!(summary.attr_rows, 2);
        assert_eq!(summary.talents, 1);
        assert_eq!(summary.talent_details, 2);
        assert_eq!(summary.skills, 1);
        assert_eq!(summary.skill_levels, 2);
        assert_eq!(summary.term_relations, 1);
    }

    #[tokio::test]
    async fn test_replace_writes_are_idempotent() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        let record = make_record("令");
        store(&db, &record).await;
        store(&db, &record).await;

        let summary = db.load_detail_summary("令").await.unwrap().unwrap();
        assert_eq!(summary.attr_rows, 2);
        assert_eq!(summary.talents, 1);
        assert_eq!(summary.talent_details, 2);
        assert_eq!(summary.skills, 1);
        assert_eq!(summary.skill_levels, 2);
        assert_eq!(summary.term_relations, 1);
    }

    #[tokio::test]
    async fn test_roster_values_survive_detail_upsert() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        let entry = RosterEntry {
            name: "令".to_string(),
            rarity: "6".to_string(),
            faction: "炎".to_string(),
            ..Default::default()
        };
        db.upsert_roster(&[entry]).await.unwrap();
        db.upsert_detail_base(&make_record("令")).await.unwrap();

        let summary = db.load_detail_summary("令").await.unwrap().unwrap();
        assert_eq!(summary.faction, "炎");
        assert_eq!(summary.branch_description, "攻击造成法术伤害");
    }

    #[tokio::test]
    async fn test_list_operator_names_orders_by_rarity() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        let entries = [("芬", "3"), ("令", "6"), ("夜烟", "4")]
            .into_iter()
            .map(|(name, rarity)| RosterEntry { name: name.into(), rarity: rarity.into(), ..Default::default() })
            .collect::<Vec<_>>();
        assert_eq!(db.upsert_roster(&entries).await.unwrap(), 3);

        let names = db.list_operator_names().await.unwrap();
        assert_eq!(names, vec!["令", "夜烟", "芬"]);
    }

    #[tokio::test]
    async fn test_summary_missing_subject() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        assert!(db.load_detail_summary("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_child_rows_require_base_row() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        let record = make_record("孤儿");
        let result = db.replace_talents("孤儿", &record.talents).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }
}

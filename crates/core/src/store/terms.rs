//! Global glossary writes.

use super::connection::OperatorDb;
use crate::Error;
use crate::model::{GlossaryTerm, StaticTerm};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl OperatorDb {
    /// Insert or update static glossary terms keyed by name.
    pub async fn upsert_static_terms(&self, terms: &[StaticTerm]) -> Result<usize, Error> {
        let terms = terms.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO global_terms (term_name, term_explanation, updated_at)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT(term_name) DO UPDATE SET
                            term_explanation = excluded.term_explanation,
                            updated_at = excluded.updated_at",
                    )?;
                    for t in &terms {
                        stmt.execute(params![&t.term_name, &t.term_explanation, &now])?;
                    }
                }
                tx.commit()?;
                Ok(terms.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Record terms scraped from detail-page tooltips.
    ///
    /// Unknown terms are inserted with the tooltip description as their
    /// explanation. Known terms keep their explanation and only gain a type
    /// label if they had none. Returns the number of rows changed.
    pub async fn record_detail_terms(&self, terms: &[GlossaryTerm]) -> Result<usize, Error> {
        let terms = terms.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                let mut changed = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO global_terms (term_name, term_type, term_explanation, updated_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(term_name) DO UPDATE SET
                            term_type = excluded.term_type,
                            updated_at = excluded.updated_at
                         WHERE global_terms.term_type IS NULL",
                    )?;
                    for t in &terms {
                        let term_type = (t.term_type != GlossaryTerm::NO_TYPE).then_some(t.term_type.as_str());
                        changed += stmt.execute(params![&t.term_name, term_type, &t.term_description, &now])?;
                    }
                }
                tx.commit()?;
                Ok(changed)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of terms in the global glossary.
    pub async fn count_global_terms(&self) -> Result<usize, Error> {
        self.conn
            .call(|conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM global_terms", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a term by name.
    ///
    /// Returns None if the term is not in the glossary.
    pub async fn get_term(&self, name: &str) -> Result<Option<(StaticTerm, Option<String>)>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<(StaticTerm, Option<String>)>, Error> {
                let result = conn.query_row(
                    "SELECT term_name, term_explanation, term_type FROM global_terms WHERE term_name = ?1",
                    params![name],
                    |row| {
                        Ok((
                            StaticTerm { term_name: row.get(0)?, term_explanation: row.get(1)? },
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                );

                match result {
                    Ok(t) => Ok(Some(t)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_term(name: &str, explanation: &str) -> StaticTerm {
        StaticTerm { term_name: name.to_string(), term_explanation: explanation.to_string() }
    }

    #[tokio::test]
    async fn test_upsert_static_terms_updates_explanation() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        db.upsert_static_terms(&[static_term("晕眩", "无法行动"), static_term("束缚", "无法移动")])
            .await
            .unwrap();
        db.upsert_static_terms(&[static_term("晕眩", "无法进行任何行动")])
            .await
            .unwrap();

        assert_eq!(db.count_global_terms().await.unwrap(), 2);
        let (term, term_type) = db.get_term("晕眩").await.unwrap().unwrap();
        assert_eq!(term.term_explanation, "无法进行任何行动");
        assert!(term_type.is_none());
    }

    #[tokio::test]
    async fn test_record_detail_terms_keeps_static_explanation() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        db.upsert_static_terms(&[static_term("法术脆弱", "受到的法术伤害提升相应比例")])
            .await
            .unwrap();

        let scraped = vec![
            GlossaryTerm {
                term_name: "法术脆弱".to_string(),
                term_type: "异常效果".to_string(),
                term_description: "tooltip text".to_string(),
            },
            GlossaryTerm {
                term_name: "凋亡损伤".to_string(),
                term_type: GlossaryTerm::NO_TYPE.to_string(),
                term_description: "元素损伤的一种".to_string(),
            },
        ];
        let changed = db.record_detail_terms(&scraped).await.unwrap();
        assert_eq!(changed, 2);

        let (known, known_type) = db.get_term("法术脆弱").await.unwrap().unwrap();
        assert_eq!(known.term_explanation, "受到的法术伤害提升相应比例");
        assert_eq!(known_type.as_deref(), Some("异常效果"));

        let (new, new_type) = db.get_term("凋亡损伤").await.unwrap().unwrap();
        assert_eq!(new.term_explanation, "元素损伤的一种");
        assert!(new_type.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_term() {
        let db = OperatorDb::open_in_memory().await.unwrap();
        assert!(db.get_term("nonexistent").await.unwrap().is_none());
    }
}

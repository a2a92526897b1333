//! Coded case persistence

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// One code attached to a case, in rank order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseCode {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub probability: f64,
}

/// Case to be persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_text: String,
    #[serde(default)]
    pub preprocessed_text: Option<String>,
    #[serde(default)]
    pub codes: Vec<CaseCode>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Case as read back from storage
#[derive(Debug, Clone, Serialize)]
pub struct StoredCase {
    pub id: Uuid,
    pub case_text: String,
    pub preprocessed_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub codes: Vec<CaseCode>,
    pub metadata: Option<serde_json::Value>,
}

/// SQLite-backed case store
#[derive(Clone)]
pub struct CaseStore {
    pool: SqlitePool,
}

impl CaseStore {
    /// Wrap a pool whose schema already exists
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = super::init_database(path).await?;
        Ok(Self::new(pool))
    }

    /// Persist a case with its codes, returning the new case id
    pub async fn persist(&self, record: &CaseRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let metadata = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO cases (id, case_text, preprocessed_text, created_at, metadata)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&record.case_text)
        .bind(&record.preprocessed_text)
        .bind(created_at)
        .bind(metadata)
        .execute(&mut *tx)
        .await?;

        for (rank, code) in record.codes.iter().enumerate() {
            sqlx::query(
                "INSERT INTO case_codes (case_id, code, name, probability, rank)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(&code.code)
            .bind(&code.name)
            .bind(code.probability)
            .bind(rank as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(case_id = %id, codes = record.codes.len(), "Case persisted");
        Ok(id)
    }

    /// Fetch one case by id
    pub async fn get(&self, id: Uuid) -> Result<Option<StoredCase>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, DateTime<Utc>, Option<String>)>(
            "SELECT id, case_text, preprocessed_text, created_at, metadata FROM cases WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Most recently stored cases, newest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<StoredCase>> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, DateTime<Utc>, Option<String>)>(
            "SELECT id, case_text, preprocessed_text, created_at, metadata
             FROM cases ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut cases = Vec::with_capacity(rows.len());
        for row in rows {
            cases.push(self.hydrate(row).await?);
        }
        Ok(cases)
    }

    async fn hydrate(
        &self,
        (id, case_text, preprocessed_text, created_at, metadata): (
            String,
            String,
            Option<String>,
            DateTime<Utc>,
            Option<String>,
        ),
    ) -> Result<StoredCase> {
        let codes = sqlx::query_as::<_, (String, Option<String>, Option<f64>)>(
            "SELECT code, name, probability FROM case_codes WHERE case_id = ? ORDER BY rank ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(code, name, probability)| CaseCode {
            code,
            name: name.unwrap_or_default(),
            probability: probability.unwrap_or(0.0),
        })
        .collect();

        let id = Uuid::parse_str(&id)
            .map_err(|e| crate::Error::Internal(format!("Corrupt case id {:?}: {}", id, e)))?;
        let metadata = metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(StoredCase {
            id,
            case_text,
            preprocessed_text,
            created_at,
            codes,
            metadata,
        })
    }
}

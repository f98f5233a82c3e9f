use async_trait::async_trait;
use mprec_core::{CaseId, CaseInformationFields};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::store::{CaseStore, CaseUnitOfWork, PlatformCaseRow, StoreError, UpsertOutcome};

#[derive(Debug, Clone)]
pub struct PgCaseStore {
    pool: PgPool,
}

impl PgCaseStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CaseStore for PgCaseStore {
    async fn begin(&self) -> Result<Box<dyn CaseUnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Dropping without `commit` rolls the transaction back.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CaseUnitOfWork for PgUnitOfWork {
    async fn platform_rows(&mut self, platform: &str) -> Result<Vec<PlatformCaseRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, ci.picture, ci.url, ci.description
              FROM case_information ci
              JOIN cases c ON c.id = ci.case_id
             WHERE ci.platform = $1
             ORDER BY c.name
            "#,
        )
        .bind(platform)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(PlatformCaseRow {
                case_id: CaseId(row.try_get("id")?),
                name: row.try_get("name")?,
                fields: CaseInformationFields {
                    picture: row.try_get("picture")?,
                    url: row.try_get("url")?,
                    description: row.try_get("description")?,
                },
            });
        }
        Ok(out)
    }

    async fn find_case_by_name(&mut self, name: &str) -> Result<Option<CaseId>, StoreError> {
        // KEY SHARE blocks a concurrent orphan delete of this case until we commit.
        let id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM cases WHERE name = $1 FOR KEY SHARE")
                .bind(name)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(id.map(CaseId))
    }

    async fn create_case(&mut self, name: &str) -> Result<CaseId, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO cases (id, name, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        id.map(CaseId).ok_or_else(|| StoreError::NameConflict {
            name: name.to_string(),
        })
    }

    async fn upsert_case_information(
        &mut self,
        case_id: CaseId,
        platform: &str,
        fields: &CaseInformationFields,
    ) -> Result<UpsertOutcome, StoreError> {
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO case_information (case_id, platform, picture, url, description, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (case_id, platform) DO UPDATE
               SET picture = EXCLUDED.picture,
                   url = EXCLUDED.url,
                   description = EXCLUDED.description,
                   updated_at = NOW()
             WHERE (case_information.picture, case_information.url, case_information.description)
                   IS DISTINCT FROM (EXCLUDED.picture, EXCLUDED.url, EXCLUDED.description)
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(case_id.0)
        .bind(platform)
        .bind(fields.picture.as_deref())
        .bind(fields.url.as_deref())
        .bind(fields.description.as_deref())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Unchanged,
        })
    }

    async fn delete_case_information(
        &mut self,
        case_id: CaseId,
        platform: &str,
    ) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM case_information WHERE case_id = $1 AND platform = $2")
                .bind(case_id.0)
                .bind(platform)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_orphan_cases(&mut self, candidates: &[CaseId]) -> Result<usize, StoreError> {
        if candidates.is_empty() {
            return Ok(0);
        }
        let ids = candidates.iter().map(|c| c.0).collect::<Vec<_>>();

        // Lock first so the NOT EXISTS below sees information attached by
        // transactions that committed while we waited. Lookups lock by name
        // and this locks by id, so two passes can deadlock here; Postgres
        // aborts one with 40P01, which surfaces as `StoreError::Transient`.
        sqlx::query("SELECT id FROM cases WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await?;

        let result = sqlx::query(
            r#"
            DELETE FROM cases c
             WHERE c.id = ANY($1)
               AND NOT EXISTS (SELECT 1 FROM case_information ci WHERE ci.case_id = c.id)
            "#,
        )
        .bind(&ids)
        .execute(&mut *self.tx)
        .await?;
        debug!(candidates = ids.len(), deleted = result.rows_affected(), "orphan cleanup");
        Ok(result.rows_affected() as usize)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

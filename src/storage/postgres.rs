use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::stats::VisitRecord;
use crate::storage::VisitStore;

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl VisitStore for PostgresStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGSERIAL PRIMARY KEY,
                timestamp BIGINT NOT NULL,
                ip TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                url TEXT NOT NULL,
                referrer TEXT NOT NULL,
                language TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_timestamp ON visits(timestamp)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_visits_url ON visits(url)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn append(&self, record: &VisitRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO visits (timestamp, ip, user_agent, url, referrer, language)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.timestamp)
        .bind(&record.ip)
        .bind(&record.user_agent)
        .bind(&record.url)
        .bind(&record.referrer)
        .bind(&record.language)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn append_batch(&self, records: &[VisitRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO visits (timestamp, ip, user_agent, url, referrer, language)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(record.timestamp)
            .bind(&record.ip)
            .bind(&record.user_agent)
            .bind(&record.url)
            .bind(&record.referrer)
            .bind(&record.language)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<VisitRecord>> {
        let records = sqlx::query_as::<_, VisitRecord>(
            r#"
            SELECT timestamp, ip, user_agent, url, referrer, language
            FROM visits
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(records)
    }

    async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}

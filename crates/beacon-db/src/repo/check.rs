//! Check lookup backed by the host application's `checks` table.

use async_trait::async_trait;
use beacon_core::CheckLookup;
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of CheckLookup.
///
/// The `checks` table belongs to the monitoring application; this crate
/// only reads its `code` column.
pub struct PgCheckLookup {
    pool: PgPool,
}

impl PgCheckLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckLookup for PgCheckLookup {
    async fn exists(&self, code: Uuid) -> beacon_core::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM checks WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| beacon_core::Error::Internal(format!("check lookup failed: {}", e)))
    }
}

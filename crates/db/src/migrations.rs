use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR, DbPool};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "profile",
        "job",
        "quotation",
        "idx_job_provider_id",
        "idx_job_worker_id",
        "idx_job_status",
        "idx_job_created_at",
        "idx_quotation_job_worker_open",
        "idx_quotation_job_accepted",
        "idx_quotation_worker_id",
        "idx_quotation_job_status",
        "trg_job_provider_immutable",
    ];

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn table_count(pool: &DbPool, name: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("check table")
        .get::<i64, _>("count")
    }

    async fn seed_profiles(pool: &DbPool) {
        sqlx::query(
            "INSERT INTO profile (id, username, role, wallet_balance, created_at, updated_at)
             VALUES
                ('P-1', 'pat', 'provider', '0', '2026-01-01T00:00:00.000000Z',
                 '2026-01-01T00:00:00.000000Z'),
                ('W-1', 'wes', 'worker', '0', '2026-01-01T00:00:00.000000Z',
                 '2026-01-01T00:00:00.000000Z')",
        )
        .execute(pool)
        .await
        .expect("seed profiles");
    }

    async fn insert_job(pool: &DbPool, status: &str, worker: Option<&str>) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO job (
                id, provider_id, worker_id, title, category, description, location, budget,
                deadline_at, time_window, status, created_at, updated_at
             ) VALUES (
                'J-1', 'P-1', ?, 'Fix fence', 'Repairs', 'Two panels', 'Leeds', '120',
                '2026-02-01T00:00:00.000000Z', 'Within 1 Week', ?,
                '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z'
             )",
        )
        .bind(worker)
        .bind(status)
        .execute(pool)
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn migrations_create_marketplace_tables() {
        let pool = migrated_pool().await;

        assert_eq!(table_count(&pool, "profile").await, 1);
        assert_eq!(table_count(&pool, "job").await, 1);
        assert_eq!(table_count(&pool, "quotation").await, 1);
    }

    #[tokio::test]
    async fn posted_job_cannot_carry_a_worker() {
        let pool = migrated_pool().await;
        seed_profiles(&pool).await;

        let rejected = insert_job(&pool, "posted", Some("W-1")).await;
        assert!(rejected.is_err(), "check constraint should refuse posted + worker");

        insert_job(&pool, "submitted", Some("W-1")).await.expect("assigned job");
    }

    #[tokio::test]
    async fn provider_id_is_immutable() {
        let pool = migrated_pool().await;
        seed_profiles(&pool).await;
        insert_job(&pool, "posted", None).await.expect("insert job");

        let result =
            sqlx::query("UPDATE job SET provider_id = 'W-1' WHERE id = 'J-1'").execute(&pool).await;
        let message = result.expect_err("trigger should abort").to_string();
        assert!(message.contains("provider_id is immutable"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = migrated_pool().await;

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert_eq!(table_count(&pool, "job").await, 0);
        assert_eq!(table_count(&pool, "quotation").await, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = migrated_pool().await;

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &DbPool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index', 'trigger')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}

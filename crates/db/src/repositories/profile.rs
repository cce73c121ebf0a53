use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use thosejobs_core::domain::profile::{Profile, ProfileId, Role};
use thosejobs_core::errors::StoreError;
use thosejobs_core::store::ProfileStore;

use super::{encode_timestamp, parse_decimal, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileStore for SqlProfileRepository {
    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profile (id, username, role, wallet_balance, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.id.0)
        .bind(&profile.username)
        .bind(profile.role.as_str())
        .bind(profile.wallet_balance.to_string())
        .bind(encode_timestamp(&profile.created_at))
        .bind(encode_timestamp(&profile.updated_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, role, wallet_balance, created_at, updated_at
             FROM profile
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(profile_from_row).transpose()?)
    }

    async fn display_names(
        &self,
        ids: &[ProfileId],
    ) -> Result<BTreeMap<ProfileId, String>, StoreError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id, username FROM profile WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.0.as_str());
        }
        separated.push_unseparated(")");

        let rows =
            builder.build().fetch_all(&self.pool).await.map_err(RepositoryError::from)?;
        let mut names = BTreeMap::new();
        for row in rows {
            let id: String = row.try_get("id").map_err(RepositoryError::from)?;
            let username: String = row.try_get("username").map_err(RepositoryError::from)?;
            names.insert(ProfileId(id), username);
        }
        Ok(names)
    }

    async fn update_role_if(
        &self,
        id: &ProfileId,
        expected: Role,
        next: Role,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            "UPDATE profile
             SET role = ?, updated_at = ?
             WHERE id = ? AND role = ?
             RETURNING id, username, role, wallet_balance, created_at, updated_at",
        )
        .bind(next.as_str())
        .bind(encode_timestamp(&now))
        .bind(&id.0)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(profile_from_row).transpose()?)
    }

    async fn update_username(
        &self,
        id: &ProfileId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            "UPDATE profile
             SET username = ?, updated_at = ?
             WHERE id = ?
             RETURNING id, username, role, wallet_balance, created_at, updated_at",
        )
        .bind(username)
        .bind(encode_timestamp(&now))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(profile_from_row).transpose()?)
    }
}

fn profile_from_row(row: SqliteRow) -> Result<Profile, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown profile role `{role_raw}`")))?;

    Ok(Profile {
        id: ProfileId(row.try_get("id")?),
        username: row.try_get("username")?,
        role,
        wallet_balance: parse_decimal("wallet_balance", row.try_get("wallet_balance")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

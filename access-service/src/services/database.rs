//! PostgreSQL-backed store.
//!
//! Uses sqlx runtime queries. Multi-table writes run in a transaction so a
//! user or group is never visible with half of its associations.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;

use super::store::{AuthRecordStore, IdentityStore};
use super::ServiceError;
use crate::models::{
    AuthRecord, Group, GroupChanges, NewUser, Permission, PermissionChanges, User, UserChanges,
    UserWithPermissions,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct GroupPermissionRow {
    group_id: i64,
    id: i64,
    code_name: String,
    name: String,
}

/// Map unique and foreign-key violations onto domain errors.
fn map_write_error(
    e: sqlx::Error,
    conflict: impl FnOnce() -> String,
    missing: &'static str,
) -> ServiceError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            ServiceError::Conflict(conflict())
        }
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            ServiceError::NotFound(missing)
        }
        other => ServiceError::Database(other),
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn permissions_of_groups(
        &self,
        group_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Permission>>, ServiceError> {
        let rows = sqlx::query_as::<_, GroupPermissionRow>(
            r#"
            SELECT gp.group_id, p.id, p.code_name, p.name
            FROM group_permissions gp
            JOIN permissions p ON p.id = gp.permission_id
            WHERE gp.group_id = ANY($1)
            ORDER BY p.id
            "#,
        )
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_group: HashMap<i64, Vec<Permission>> = HashMap::new();
        for row in rows {
            by_group.entry(row.group_id).or_default().push(Permission {
                id: row.id,
                code_name: row.code_name,
                name: row.name,
            });
        }
        Ok(by_group)
    }

    async fn attach_permissions(&self, mut groups: Vec<Group>) -> Result<Vec<Group>, ServiceError> {
        let ids: Vec<i64> = groups.iter().map(|g| g.id).collect();
        let mut by_group = self.permissions_of_groups(&ids).await?;
        for group in &mut groups {
            group.permissions = by_group.remove(&group.id).unwrap_or_default();
        }
        Ok(groups)
    }

    /// Eagerly load a user's groups (with permissions) and direct permissions.
    async fn with_relations(&self, user: User) -> Result<UserWithPermissions, ServiceError> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.code_name, g.name
            FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = $1
            ORDER BY g.id
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;
        let groups = self.attach_permissions(groups).await?;

        let user_permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.code_name, p.name
            FROM permissions p
            JOIN user_permissions up ON up.permission_id = p.id
            WHERE up.user_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(UserWithPermissions {
            user,
            groups,
            user_permissions,
        })
    }

    async fn replace_group_permissions(
        tx: &mut Transaction<'_, Postgres>,
        group_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM group_permissions WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut **tx)
            .await?;

        if !permission_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO group_permissions (group_id, permission_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(group_id)
            .bind(permission_ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, || "Duplicate permission".to_string(), "Permission"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_user_with_permissions(
        &self,
        id: i64,
    ) -> Result<Option<UserWithPermissions>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match user {
            Some(user) => Ok(Some(self.with_relations(user).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPermissions>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match user {
            Some(user) => Ok(Some(self.with_relations(user).await?)),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserWithPermissions>, ServiceError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(users.len());
        for user in users {
            out.push(self.with_relations(user).await?);
        }
        Ok(out)
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<UserWithPermissions, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, || "Email already registered".to_string(), "User"))?;

        if !new_user.group_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO user_groups (user_id, group_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user.id)
            .bind(&new_user.group_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, || "Duplicate group".to_string(), "Group"))?;
        }

        if !new_user.permission_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO user_permissions (user_id, permission_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user.id)
            .bind(&new_user.permission_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, || "Duplicate permission".to_string(), "Permission"))?;
        }

        tx.commit().await?;

        tracing::info!(user_id = user.id, "User created");

        self.with_relations(user).await
    }

    async fn update_user(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> Result<Option<UserWithPermissions>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, name = $3, password_hash = COALESCE($4, password_hash)
            WHERE id = $1
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(&changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, || "Email already registered".to_string(), "User"))?;

        match user {
            Some(user) => Ok(Some(self.with_relations(user).await?)),
            None => Ok(None),
        }
    }

    async fn delete_user(&self, id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, ServiceError> {
        let groups = sqlx::query_as::<_, Group>("SELECT id, code_name, name FROM groups ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        self.attach_permissions(groups).await
    }

    async fn find_group(&self, id: i64) -> Result<Option<Group>, ServiceError> {
        let group = sqlx::query_as::<_, Group>("SELECT id, code_name, name FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match group {
            Some(group) => Ok(self.attach_permissions(vec![group]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_group_by_code(&self, code_name: &str) -> Result<Option<Group>, ServiceError> {
        let group =
            sqlx::query_as::<_, Group>("SELECT id, code_name, name FROM groups WHERE code_name = $1")
                .bind(code_name)
                .fetch_optional(&self.pool)
                .await?;

        match group {
            Some(group) => Ok(self.attach_permissions(vec![group]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_group(&self, group: GroupChanges) -> Result<Group, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Group>(
            "INSERT INTO groups (code_name, name) VALUES ($1, $2) RETURNING id, code_name, name",
        )
        .bind(&group.code_name)
        .bind(&group.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_write_error(e, || format!("Group '{}' already exists", group.code_name), "Group")
        })?;

        Self::replace_group_permissions(&mut tx, created.id, &group.permission_ids).await?;
        tx.commit().await?;

        self.attach_permissions(vec![created])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("Inserted group not returned")))
    }

    async fn update_group(
        &self,
        id: i64,
        changes: GroupChanges,
    ) -> Result<Option<Group>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Group>(
            "UPDATE groups SET name = $2 WHERE id = $1 RETURNING id, code_name, name",
        )
        .bind(id)
        .bind(&changes.name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        Self::replace_group_permissions(&mut tx, id, &changes.permission_ids).await?;
        tx.commit().await?;

        Ok(self.attach_permissions(vec![updated]).await?.pop())
    }

    async fn delete_group(&self, id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT id, code_name, name FROM permissions ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT id, code_name, name FROM permissions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_permission_by_code(
        &self,
        code_name: &str,
    ) -> Result<Option<Permission>, ServiceError> {
        Ok(sqlx::query_as::<_, Permission>(
            "SELECT id, code_name, name FROM permissions WHERE code_name = $1",
        )
        .bind(code_name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_permission(
        &self,
        permission: PermissionChanges,
    ) -> Result<Permission, ServiceError> {
        sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (code_name, name) VALUES ($1, $2) RETURNING id, code_name, name",
        )
        .bind(&permission.code_name)
        .bind(&permission.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(
                e,
                || format!("Permission '{}' already exists", permission.code_name),
                "Permission",
            )
        })
    }

    async fn update_permission(
        &self,
        id: i64,
        changes: PermissionChanges,
    ) -> Result<Option<Permission>, ServiceError> {
        Ok(sqlx::query_as::<_, Permission>(
            "UPDATE permissions SET name = $2 WHERE id = $1 RETURNING id, code_name, name",
        )
        .bind(id)
        .bind(&changes.name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_permission(&self, id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            ServiceError::Database(e)
        })?;
        Ok(())
    }
}

#[async_trait]
impl AuthRecordStore for PgStore {
    async fn find_auth_record(&self, id: i64) -> Result<Option<AuthRecord>, ServiceError> {
        Ok(sqlx::query_as::<_, AuthRecord>(
            "SELECT id, text, owner_id, created_at FROM auth_records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_auth_records_by_owner(
        &self,
        owner_id: i64,
        skip: i64,
        take: i64,
    ) -> Result<Vec<AuthRecord>, ServiceError> {
        Ok(sqlx::query_as::<_, AuthRecord>(
            r#"
            SELECT id, text, owner_id, created_at
            FROM auth_records
            WHERE owner_id = $1
            ORDER BY id
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(skip.max(0))
        .bind(take.max(0))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_auth_record(
        &self,
        owner_id: i64,
        text: &str,
    ) -> Result<AuthRecord, ServiceError> {
        sqlx::query_as::<_, AuthRecord>(
            r#"
            INSERT INTO auth_records (text, owner_id)
            VALUES ($1, $2)
            RETURNING id, text, owner_id, created_at
            "#,
        )
        .bind(text)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, || "Duplicate record".to_string(), "User"))
    }

    async fn update_auth_record(
        &self,
        id: i64,
        owner_id: i64,
        text: &str,
    ) -> Result<Option<AuthRecord>, ServiceError> {
        Ok(sqlx::query_as::<_, AuthRecord>(
            r#"
            UPDATE auth_records SET text = $3
            WHERE id = $1 AND owner_id = $2
            RETURNING id, text, owner_id, created_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_auth_record(&self, id: i64, owner_id: i64) -> Result<bool, ServiceError> {
        let result = sqlx::query("DELETE FROM auth_records WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

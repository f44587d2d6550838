use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::role::Role;

/// User record. Accounts are never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, is_verified, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        is_verified: bool,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role, is_verified)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, role, is_verified, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(is_verified)
        .fetch_one(db)
        .await
    }

    /// Account directory, optionally narrowed to one role. The unfiltered
    /// form lists the most privileged accounts first.
    pub async fn list(db: &PgPool, role: Option<Role>) -> sqlx::Result<Vec<User>> {
        match role {
            Some(role) => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, email, password_hash, role, is_verified, created_at
                    FROM users
                    WHERE role = $1
                    ORDER BY username
                    "#,
                )
                .bind(role)
                .fetch_all(db)
                .await
            }
            None => {
                sqlx::query_as::<_, User>(
                    r#"
                    SELECT id, username, email, password_hash, role, is_verified, created_at
                    FROM users
                    ORDER BY role DESC, username
                    "#,
                )
                .fetch_all(db)
                .await
            }
        }
    }

    /// Replace the stored password hash. Returns false when no such user.
    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> sqlx::Result<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

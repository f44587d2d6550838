use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::auth::role::Role;
use crate::error::{is_unique_violation, ApiError};

/// One work-log row. At most one per (user, work date), enforced by the
/// unique index rather than application locking.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TimesheetEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub work_date: Date,
    pub clock_in: Time,
    pub clock_out: Time,
    pub task_description: String,
    pub work_minutes: i32,
    pub created_at: OffsetDateTime,
}

/// List row joined with the owner's username for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EntryWithOwner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub work_date: Date,
    pub clock_in: Time,
    pub clock_out: Time,
    pub task_description: String,
    pub work_minutes: i32,
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    work_date: Date,
    clock_in: Time,
    clock_out: Time,
    work_minutes: i32,
    task_description: &str,
) -> Result<Uuid, ApiError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO timesheet (user_id, work_date, clock_in, clock_out, work_minutes, task_description)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(work_date)
    .bind(clock_in)
    .bind(clock_out)
    .bind(work_minutes)
    .bind(task_description)
    .fetch_one(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::DuplicateEntry
        } else {
            ApiError::Database(e)
        }
    })?;
    Ok(id)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<TimesheetEntry>> {
    sqlx::query_as::<_, TimesheetEntry>(
        r#"
        SELECT id, user_id, work_date, clock_in, clock_out, task_description, work_minutes, created_at
        FROM timesheet
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// In-place update with the (owner, date) uniqueness re-checked against
/// other rows. Runs in one transaction; any error rolls back.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    owner_id: Uuid,
    work_date: Date,
    clock_in: Time,
    clock_out: Time,
    work_minutes: i32,
    task_description: &str,
) -> Result<(), ApiError> {
    let mut tx = db.begin().await?;

    let occupied: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM timesheet WHERE user_id = $1 AND work_date = $2 AND id != $3",
    )
    .bind(owner_id)
    .bind(work_date)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    if occupied.is_some() {
        return Err(ApiError::DuplicateEntry);
    }

    let res = sqlx::query(
        r#"
        UPDATE timesheet
        SET work_date = $1, clock_in = $2, clock_out = $3, work_minutes = $4, task_description = $5
        WHERE id = $6
        "#,
    )
    .bind(work_date)
    .bind(clock_in)
    .bind(clock_out)
    .bind(work_minutes)
    .bind(task_description)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        // The unique index can still fire if another insert won the race
        // between our check and the write.
        if is_unique_violation(&e) {
            ApiError::DuplicateEntry
        } else {
            ApiError::Database(e)
        }
    })?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    tx.commit().await?;
    Ok(())
}

/// Delete, optionally scoped to an owner (user-role callers delete only
/// their own rows at the SQL level). Returns false when nothing matched.
pub async fn delete(db: &PgPool, id: Uuid, scope_owner: Option<Uuid>) -> sqlx::Result<bool> {
    let res = match scope_owner {
        Some(owner) => {
            sqlx::query("DELETE FROM timesheet WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner)
                .execute(db)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM timesheet WHERE id = $1")
                .bind(id)
                .execute(db)
                .await?
        }
    };
    Ok(res.rows_affected() > 0)
}

const LIST_SELECT: &str = r#"
    SELECT t.id, t.user_id, u.username,
           t.work_date, t.clock_in, t.clock_out,
           t.task_description, t.work_minutes
    FROM timesheet t
    JOIN users u ON u.id = t.user_id
"#;

pub async fn list_own(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<EntryWithOwner>> {
    let sql = format!("{LIST_SELECT} WHERE t.user_id = $1 ORDER BY t.work_date DESC");
    sqlx::query_as::<_, EntryWithOwner>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await
}

/// Seniors see user-role accounts plus their own rows, optionally narrowed
/// to one visible target.
pub async fn list_for_senior(
    db: &PgPool,
    actor_id: Uuid,
    target: Option<Uuid>,
) -> sqlx::Result<Vec<EntryWithOwner>> {
    match target {
        Some(target) => {
            let sql = format!(
                "{LIST_SELECT} WHERE t.user_id = $1 AND (u.role = $2 OR t.user_id = $3) ORDER BY t.work_date DESC"
            );
            sqlx::query_as::<_, EntryWithOwner>(&sql)
                .bind(target)
                .bind(Role::User)
                .bind(actor_id)
                .fetch_all(db)
                .await
        }
        None => {
            let sql = format!(
                "{LIST_SELECT} WHERE u.role = $1 OR t.user_id = $2 ORDER BY t.work_date DESC"
            );
            sqlx::query_as::<_, EntryWithOwner>(&sql)
                .bind(Role::User)
                .bind(actor_id)
                .fetch_all(db)
                .await
        }
    }
}

pub async fn list_all(db: &PgPool, target: Option<Uuid>) -> sqlx::Result<Vec<EntryWithOwner>> {
    match target {
        Some(target) => {
            let sql = format!("{LIST_SELECT} WHERE t.user_id = $1 ORDER BY t.work_date DESC");
            sqlx::query_as::<_, EntryWithOwner>(&sql)
                .bind(target)
                .fetch_all(db)
                .await
        }
        None => {
            let sql = format!("{LIST_SELECT} ORDER BY t.work_date DESC");
            sqlx::query_as::<_, EntryWithOwner>(&sql).fetch_all(db).await
        }
    }
}

// Run with `cargo test -- --ignored` against a disposable database; these
// exercise the unique index the duplicate handling leans on.
#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::auth::repo::User;
    use time::macros::{date, time};

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        pool
    }

    async fn fresh_user(db: &PgPool) -> User {
        let email = format!("{}@db-test.local", Uuid::new_v4());
        User::create(db, "db-test", &email, "x", Role::User, true)
            .await
            .expect("create user")
    }

    #[tokio::test]
    #[ignore]
    async fn second_entry_for_same_day_is_rejected_and_first_survives() {
        let db = test_pool().await;
        let user = fresh_user(&db).await;
        let day = date!(2025 - 03 - 03);

        let first = insert(&db, user.id, day, time!(09:00), time!(17:00), 420, "morning")
            .await
            .expect("first insert");

        let err = insert(&db, user.id, day, time!(10:00), time!(18:00), 420, "again")
            .await
            .expect_err("duplicate day must be rejected");
        assert!(matches!(err, ApiError::DuplicateEntry));

        let kept = find_by_id(&db, first)
            .await
            .expect("lookup")
            .expect("first entry still present");
        assert_eq!(kept.task_description, "morning");
        assert_eq!(kept.clock_in, time!(09:00));
    }

    #[tokio::test]
    #[ignore]
    async fn update_onto_occupied_date_is_rejected() {
        let db = test_pool().await;
        let user = fresh_user(&db).await;

        insert(
            &db,
            user.id,
            date!(2025 - 03 - 04),
            time!(09:00),
            time!(17:00),
            420,
            "day one",
        )
        .await
        .expect("insert day one");
        let second = insert(
            &db,
            user.id,
            date!(2025 - 03 - 05),
            time!(09:00),
            time!(17:00),
            420,
            "day two",
        )
        .await
        .expect("insert day two");

        let err = update(
            &db,
            second,
            user.id,
            date!(2025 - 03 - 04),
            time!(08:00),
            time!(16:00),
            420,
            "moved",
        )
        .await
        .expect_err("moving onto an occupied date must be rejected");
        assert!(matches!(err, ApiError::DuplicateEntry));

        let untouched = find_by_id(&db, second)
            .await
            .expect("lookup")
            .expect("second entry still present");
        assert_eq!(untouched.work_date, date!(2025 - 03 - 05));
        assert_eq!(untouched.task_description, "day two");
    }
}

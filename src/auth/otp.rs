use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::password::{hash_secret, verify_secret};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "otp_purpose", rename_all = "snake_case")]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

/// One-time passcode record. Only the argon2 hash of the code is stored;
/// the plaintext exists solely in the issuing request for delivery.
#[derive(Debug, Clone, FromRow)]
pub struct OtpRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub otp_hash: String,
    pub purpose: OtpPurpose,
    pub expires_at: OffsetDateTime,
    pub is_used: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, PartialEq, Eq)]
pub enum OtpStatus {
    Usable,
    Expired,
    AlreadyUsed,
}

impl OtpRecord {
    /// Time/usage check, separate from the hash comparison.
    pub fn status(&self, now: OffsetDateTime) -> OtpStatus {
        if self.is_used {
            OtpStatus::AlreadyUsed
        } else if now > self.expires_at {
            OtpStatus::Expired
        } else {
            OtpStatus::Usable
        }
    }
}

/// Uniformly random 6-digit code, leading zeros allowed.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Store a fresh OTP and hand the plaintext back for delivery. Earlier codes
/// for the same purpose stay in the table but validation only ever looks at
/// the newest unused one.
pub async fn issue(
    db: &PgPool,
    user_id: Uuid,
    purpose: OtpPurpose,
    expiry_minutes: i64,
) -> Result<String, ApiError> {
    let code = generate_code();
    let otp_hash = hash_secret(&code)?;
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(expiry_minutes);

    sqlx::query(
        r#"
        INSERT INTO user_otps (user_id, otp_hash, purpose, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(&otp_hash)
    .bind(purpose)
    .bind(expires_at)
    .execute(db)
    .await?;

    debug!(%user_id, ?purpose, "otp issued");
    Ok(code)
}

/// Validate a submitted code against the most recent unused record for
/// (user, purpose). On success the record is consumed for good and, for the
/// verify_email purpose, the account is flagged verified in the same
/// transaction.
pub async fn verify(
    db: &PgPool,
    user_id: Uuid,
    submitted: &str,
    purpose: OtpPurpose,
) -> Result<(), ApiError> {
    let submitted = submitted.trim();
    let mut tx = db.begin().await?;

    let record = sqlx::query_as::<_, OtpRecord>(
        r#"
        SELECT id, user_id, otp_hash, purpose, expires_at, is_used, created_at
        FROM user_otps
        WHERE user_id = $1 AND purpose = $2 AND is_used = FALSE
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .bind(purpose)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ApiError::OtpNotFound)?;

    match record.status(OffsetDateTime::now_utc()) {
        OtpStatus::Usable => {}
        OtpStatus::Expired => return Err(ApiError::OtpExpired),
        OtpStatus::AlreadyUsed => return Err(ApiError::OtpNotFound),
    }

    if !verify_secret(submitted, &record.otp_hash)? {
        return Err(ApiError::OtpInvalid);
    }

    sqlx::query("UPDATE user_otps SET is_used = TRUE WHERE id = $1")
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

    if purpose == OtpPurpose::VerifyEmail {
        sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    debug!(%user_id, ?purpose, "otp verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(is_used: bool, expires_in: Duration) -> OtpRecord {
        let now = OffsetDateTime::now_utc();
        OtpRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            otp_hash: String::new(),
            purpose: OtpPurpose::VerifyEmail,
            expires_at: now + expires_in,
            is_used,
            created_at: now,
        }
    }

    #[test]
    fn code_is_six_digits_with_leading_zeros() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn fresh_record_is_usable() {
        let rec = record(false, Duration::minutes(10));
        assert_eq!(rec.status(OffsetDateTime::now_utc()), OtpStatus::Usable);
    }

    #[test]
    fn expired_record_fails_even_with_matching_code() {
        // Expiry is checked before the hash, so a matching code cannot
        // resurrect a stale record.
        let rec = record(false, Duration::minutes(-1));
        assert_eq!(rec.status(OffsetDateTime::now_utc()), OtpStatus::Expired);
    }

    #[test]
    fn used_record_never_validates_again() {
        let rec = record(true, Duration::minutes(10));
        assert_eq!(
            rec.status(OffsetDateTime::now_utc()),
            OtpStatus::AlreadyUsed
        );
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let rec = record(false, Duration::ZERO);
        // Exactly at expires_at is still valid; only strictly later fails.
        assert_eq!(rec.status(rec.expires_at), OtpStatus::Usable);
        assert_eq!(
            rec.status(rec.expires_at + Duration::seconds(1)),
            OtpStatus::Expired
        );
    }
}

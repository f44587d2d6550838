use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RefreshRequest, RegisterRequest, RegisterResponse, ResendVerificationRequest,
            ResetPasswordRequest, VerifyEmailRequest,
        },
        jwt::{AuthUser, JwtKeys},
        otp::{self, OtpPurpose},
        password::{hash_secret, verify_secret},
        repo::User,
        role::Role,
    },
    error::{is_unique_violation, ApiError},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users", get(list_users))
}

fn sign_pair(state: &AppState, user: &User) -> anyhow::Result<(String, String)> {
    let keys = JwtKeys::from_ref(state);
    let access = keys.sign_access(user.id, &user.email, user.role)?;
    let refresh = keys.sign_refresh(user.id, &user.email, user.role)?;
    Ok((access, refresh))
}

/// Issue a fresh verify_email code and mail it. A stored code stays valid
/// until expiry even if delivery fails.
async fn send_verification_code(state: &AppState, user: &User) -> Result<(), ApiError> {
    let code = otp::issue(
        &state.db,
        user.id,
        OtpPurpose::VerifyEmail,
        state.config.otp_expiry_minutes,
    )
    .await?;
    let body = format!(
        "Your verification code is {}. It expires in {} minutes.",
        code, state.config.otp_expiry_minutes
    );
    if let Err(e) = state
        .mailer
        .send(&user.email, "Verify your email", &body)
        .await
    {
        warn!(error = %e, user_id = %user.id, "verification email delivery failed");
    }
    Ok(())
}

/// Which accounts a directory request may see: admins the whole roster,
/// seniors only user-role accounts, everyone else nothing.
fn visible_accounts(actor: Role) -> Option<Option<Role>> {
    match actor {
        Role::Admin => Some(None),
        Role::Senior => Some(Some(Role::User)),
        Role::User => None,
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::EmailTaken);
    }

    let hash = hash_secret(&payload.password)?;
    let verification_required = state.config.require_email_verification;

    // The unique index is the real guard; the lookup above only gives a
    // friendlier early answer.
    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &hash,
        Role::User,
        !verification_required,
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::EmailTaken
        } else {
            ApiError::Database(e)
        }
    })?;

    if verification_required {
        send_verification_code(&state, &user).await?;
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            verification_required,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(mut payload): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::OtpNotFound)?;

    otp::verify(&state.db, user.id, &payload.code, OtpPurpose::VerifyEmail).await?;

    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse {
        message: "Email verified, you can log in now".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(mut payload): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Same response whether the address is unknown, unverified or already
    // verified, so the endpoint cannot be used to enumerate accounts.
    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        if !user.is_verified {
            send_verification_code(&state, &user).await?;
            info!(user_id = %user.id, "verification code reissued");
        }
    }

    Ok(Json(MessageResponse {
        message: "If that email is registered and unverified, a new code has been sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    // Unknown email and bad password are indistinguishable to the caller.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::InvalidCredentials
        })?;

    if !verify_secret(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if state.config.require_email_verification && !user.is_verified {
        return Err(ApiError::NotVerified);
    }

    let (access_token, refresh_token) = sign_pair(&state, &user)?;

    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let (access_token, refresh_token) = sign_pair(&state, &user)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Same response whether or not the address is registered, so the
    // endpoint cannot be used to enumerate accounts.
    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        let code = otp::issue(
            &state.db,
            user.id,
            OtpPurpose::ResetPassword,
            state.config.otp_expiry_minutes,
        )
        .await?;
        let body = format!(
            "Your password reset code is {}. It expires in {} minutes.",
            code, state.config.otp_expiry_minutes
        );
        if let Err(e) = state
            .mailer
            .send(&user.email, "Password reset", &body)
            .await
        {
            warn!(error = %e, user_id = %user.id, "reset email delivery failed");
        }
    }

    Ok(Json(MessageResponse {
        message: "If that email is registered, a reset code has been sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.new_password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::OtpNotFound)?;

    // Single-use consumption here is what invalidates the reset code; any
    // earlier codes were already superseded by the latest-unused rule.
    otp::verify(&state.db, user.id, &payload.code, OtpPurpose::ResetPassword).await?;

    let hash = hash_secret(&payload.new_password)?;
    if !User::update_password(&state.db, user.id, &hash).await? {
        return Err(ApiError::NotFound);
    }

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password updated, you can log in now".into(),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let filter = visible_accounts(auth.role).ok_or(ApiError::Unauthorized)?;
    let users = User::list(&state.db, filter).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, auth.id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directory_visibility_follows_role() {
        assert_eq!(visible_accounts(Role::Admin), Some(None));
        assert_eq!(visible_accounts(Role::Senior), Some(Some(Role::User)));
        assert_eq!(visible_accounts(Role::User), None);
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("worker@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }
}

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// New accounts must confirm their email with an OTP before login.
    pub require_email_verification: bool,
    /// Seniors may update/delete entries of user-role accounts, not just read them.
    pub senior_can_write: bool,
    pub otp_expiry_minutes: i64,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "logtracker".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "logtracker-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let require_email_verification = std::env::var("REQUIRE_EMAIL_VERIFICATION")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let senior_can_write = std::env::var("SENIOR_CAN_WRITE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let otp_expiry_minutes = std::env::var("OTP_EXPIRY_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(10);

        // SMTP is optional; without it the mailer falls back to a no-op,
        // which is enough for local development.
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "no-reply@logtracker.local".into()),
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            jwt,
            require_email_verification,
            senior_can_write,
            otp_expiry_minutes,
            smtp,
        })
    }
}

use anyhow::{Context, anyhow, bail};
use chrono::Duration;
use tracing::warn;

/// Lifetime of access tokens when `JWT_EXPIRE` is unset.
pub const DEFAULT_ACCESS_TOKEN_TTL: &str = "7d";
/// Refresh tokens always live for 30 days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Token signing configuration, read once at launch and managed by Rocket.
///
/// | Env Var              | Required | Default        |
/// |----------------------|----------|----------------|
/// | `JWT_SECRET`         | **yes**  | --             |
/// | `JWT_REFRESH_SECRET` | no       | `JWT_SECRET`   |
/// | `JWT_EXPIRE`         | no       | `7d`           |
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl AuthConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let access_secret = non_empty_var("JWT_SECRET")
            .ok_or_else(|| anyhow!("JWT_SECRET must be set to a non-empty value"))?;

        let refresh_secret = match non_empty_var("JWT_REFRESH_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_REFRESH_SECRET not set, signing refresh tokens with JWT_SECRET");
                access_secret.clone()
            }
        };

        let expire = non_empty_var("JWT_EXPIRE").unwrap_or_else(|| DEFAULT_ACCESS_TOKEN_TTL.into());
        let access_token_ttl =
            parse_duration(&expire).with_context(|| format!("Invalid JWT_EXPIRE '{}'", expire))?;

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_ttl,
            refresh_token_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `30s`, `15m`, `12h`, `7d` or a bare number of seconds.
pub fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);

    if amount.is_empty() {
        bail!("duration must start with a number");
    }

    let amount: i64 = amount.parse().context("duration amount out of range")?;

    let duration = match unit {
        "" | "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        other => bail!("unknown duration unit '{}'", other),
    };

    duration.ok_or_else(|| anyhow!("duration out of range"))
}

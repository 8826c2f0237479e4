use std::time::{Duration, Instant};

use crate::error::AppError;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before Google's stated expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const CLIENT_ID_KEYS: &[&str] = &["GOOGLE_CLIENT_ID", "GOOGLE_OAUTH_CLIENT_ID", "GCP_CLIENT_ID"];
const CLIENT_SECRET_KEYS: &[&str] = &[
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_OAUTH_CLIENT_SECRET",
    "GCP_CLIENT_SECRET",
];

/// Return the first non-empty value among the given keys, looking at the
/// process environment first and then at `.env`.
pub fn env_var_first_nonempty(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok().or_else(|| dotenvy::var(key).ok()))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// OAuth client plus the long-lived refresh token for one calendar account.
#[derive(Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl GoogleCredentials {
    /// Resolve client credentials from env / `.env` and pair them with
    /// `refresh_token`.
    pub fn resolve(refresh_token: String) -> Result<Self, AppError> {
        let (client_id, client_secret) = resolve_client_credentials()?;
        if refresh_token.trim().is_empty() {
            return Err(AppError::Config(
                "Google Calendar refresh token is empty".into(),
            ));
        }
        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
        })
    }
}

/// Resolve the Google OAuth client id and secret.
///
/// Returns `(client_id, client_secret)` on success.
pub fn resolve_client_credentials() -> Result<(String, String), AppError> {
    match (
        env_var_first_nonempty(CLIENT_ID_KEYS),
        env_var_first_nonempty(CLIENT_SECRET_KEYS),
    ) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AppError::Config(
            "Google OAuth client credentials are missing. Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET in the environment or .env.".into(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Exchange a refresh token for a fresh access token.
pub async fn exchange_refresh_token(
    http: &reqwest::Client,
    credentials: &GoogleCredentials,
) -> Result<AccessToken, AppError> {
    let requested_at = Instant::now();
    let response = http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .map_err(|e| AppError::Calendar(format!("Google token refresh request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
        return Err(AppError::Calendar(format!(
            "Google token refresh failed ({}): {}",
            status, body
        )));
    }

    let body = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AppError::Calendar(format!("Invalid Google token response JSON: {}", e)))?;

    let token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Calendar("Google token refresh did not return access_token".into()))?;

    tracing::debug!("Google access token refreshed");
    Ok(AccessToken {
        token,
        expires_at: requested_at + Duration::from_secs(body.expires_in.unwrap_or(3600)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_first_nonempty_skips_blank() {
        std::env::set_var("BILLCYCLE_TEST_BLANK", "   ");
        std::env::set_var("BILLCYCLE_TEST_SET", " value ");
        assert_eq!(
            env_var_first_nonempty(&["BILLCYCLE_TEST_BLANK", "BILLCYCLE_TEST_SET"]),
            Some("value".into())
        );
        assert_eq!(env_var_first_nonempty(&["BILLCYCLE_TEST_UNSET_XYZ"]), None);
    }

    #[test]
    fn test_access_token_freshness() {
        let now = Instant::now();
        let token = AccessToken {
            token: "t".into(),
            expires_at: now + Duration::from_secs(3600),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::from_secs(3550)));
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = GoogleCredentials {
            client_id: "id".into(),
            client_secret: "s3cret".into(),
            refresh_token: "r3fresh".into(),
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("s3cret"));
        assert!(!printed.contains("r3fresh"));
    }
}

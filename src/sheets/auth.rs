//! Service-account authentication for Google APIs
//!
//! Implements the OAuth 2.0 JWT bearer flow: an RS256-signed assertion made
//! from the service-account key is exchanged at the key's `token_uri` for a
//! short-lived access token. The token is reused until shortly before it
//! expires.

use crate::sheets::client::SheetError;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Scopes needed to write cells and to find a spreadsheet by title
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account JSON key the bot needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read a key file downloaded from the Google Cloud console
    pub fn load(path: &Path) -> Result<Self, SheetError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SheetError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SheetError> {
        let key: ServiceAccountKey = serde_json::from_str(content)
            .map_err(|e| SheetError::Credentials(format!("malformed key file: {e}")))?;

        if key.client_email.is_empty() {
            return Err(SheetError::Credentials(
                "client_email is empty".to_string(),
            ));
        }
        Ok(key)
    }
}

/// Claims of the signed assertion
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Issues and caches access tokens for one service account
pub struct TokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: Vec<String>,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self, SheetError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SheetError::Credentials(format!("invalid private key: {e}")))?;

        Ok(Self {
            key,
            encoding_key,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Return a valid access token, fetching a new one when needed
    pub async fn access_token(&self) -> Result<String, SheetError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    fn sign_assertion(&self, now: u64) -> Result<String, SheetError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| SheetError::Credentials(format!("failed to sign assertion: {e}")))
    }

    async fn fetch_token(&self) -> Result<CachedToken, SheetError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let assertion = self.sign_assertion(now)?;

        debug!(
            "Requesting access token for {} from {}",
            self.key.client_email, self.key.token_uri
        );

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SheetError::NetworkError(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                })
                .unwrap_or(body);
            error!("Token exchange rejected ({}): {}", status, detail);
            return Err(SheetError::AuthFailed(format!("{status}: {detail}")));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SheetError::AuthFailed(format!("malformed token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in);
        Ok(CachedToken {
            access_token: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_json_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email":"bot@project.iam.gserviceaccount.com","private_key":"x"}"#,
        )
        .unwrap();

        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(key.private_key_id, None);
    }

    #[test]
    fn test_key_debug_hides_private_key() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email":"bot@project.iam.gserviceaccount.com","private_key":"SECRET-MATERIAL"}"#,
        )
        .unwrap();

        let debug = format!("{key:?}");
        assert!(debug.contains("bot@project"));
        assert!(!debug.contains("SECRET-MATERIAL"));
    }

    #[test]
    fn test_malformed_key_file() {
        let err = ServiceAccountKey::from_json("{not json").unwrap_err();
        assert!(matches!(err, SheetError::Credentials(_)));

        let err = ServiceAccountKey::from_json(r#"{"client_email":"","private_key":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, SheetError::Credentials(_)));
    }

    #[test]
    fn test_missing_key_file() {
        let err = ServiceAccountKey::load(Path::new("/nonexistent/credentials.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email":"bot@project.iam.gserviceaccount.com","private_key":"not a pem"}"#,
        )
        .unwrap();

        let result = TokenProvider::new(key, Client::new());
        assert!(matches!(result, Err(SheetError::Credentials(_))));
    }
}

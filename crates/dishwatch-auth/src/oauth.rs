use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use tracing::debug;

const SCOPE: &str = "openid email profile";

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("token endpoint returned {status}: {body}")]
    Exchange {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("bad authorize URL: {0}")]
    BadUrl(String),
}

/// Identity-provider endpoints and client credentials for the
/// authorization-code flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl OAuthConfig {
    /// Build the provider authorize URL the client is sent to. `state`
    /// is the CSRF token the callback must echo back.
    pub fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = reqwest::Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::BadUrl(e.to_string()))?;
        Ok(url.into())
    }

    /// Exchange the callback code for a bearer access token.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<String, OAuthError> {
        let resp = http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::Exchange { status, body });
        }

        let token: TokenResponse = resp.json().await?;
        debug!("authorization code exchanged for access token");
        Ok(token.access_token)
    }
}

/// Random alphanumeric CSRF state for the authorize request.
pub fn new_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

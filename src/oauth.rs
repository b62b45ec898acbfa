use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_sessions::Session;
use tracing::debug;

use crate::config::OAuthSettings;
use crate::error::{GatewayError, Result};

const PENDING_LOGIN_KEY: &str = "oauth_pending";

type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

#[derive(Debug, Serialize, Deserialize)]
struct PendingLogin {
    csrf_state: String,
    pkce_verifier: String,
}

/// GitHub OAuth 2.0 authorization code flow with PKCE.
///
/// The CSRF state and PKCE verifier live in the visitor's session between the
/// redirect to GitHub and the callback, so a callback is only accepted by the
/// browser that started the flow.
pub struct GitHubOAuth {
    client: ConfiguredClient,
    http: reqwest::Client,
}

impl GitHubOAuth {
    pub fn new(settings: &OAuthSettings, timeout: Duration) -> Result<Self> {
        let auth_url = AuthUrl::new(settings.authorize_url.clone())
            .map_err(|e| GatewayError::ConfigError(format!("Invalid authorize URL: {}", e)))?;
        let token_url = TokenUrl::new(settings.token_url.clone())
            .map_err(|e| GatewayError::ConfigError(format!("Invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(settings.callback_url.clone())
            .map_err(|e| GatewayError::ConfigError(format!("Invalid callback URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(settings.client_id.clone()))
            .set_client_secret(ClientSecret::new(settings.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        // The token exchange must never follow redirects.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self { client, http })
    }

    /// Builds the GitHub authorize URL and remembers the CSRF state and PKCE
    /// verifier in the session.
    pub async fn begin(&self, session: &Session) -> Result<String> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("user:email".to_string()))
            .add_scope(Scope::new("read:user".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        let pending = PendingLogin {
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        };
        session.insert(PENDING_LOGIN_KEY, pending).await?;

        Ok(auth_url.to_string())
    }

    /// Validates the returned state and exchanges the code for an access token.
    /// The pending login is consumed whether or not the exchange succeeds.
    pub async fn complete(&self, session: &Session, code: &str, state: &str) -> Result<String> {
        let pending: PendingLogin = session
            .remove(PENDING_LOGIN_KEY)
            .await?
            .ok_or_else(|| GatewayError::OAuthError("No login in progress".to_string()))?;

        if pending.csrf_state != state {
            return Err(GatewayError::OAuthError("OAuth state mismatch".to_string()));
        }

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| GatewayError::OAuthError(format!("Token exchange failed: {}", e)))?;

        debug!("Exchanged OAuth code for access token");
        Ok(token.access_token().secret().clone())
    }
}

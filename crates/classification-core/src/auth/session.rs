use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use tracing::{debug, info};

use super::{AuthorizationFlow, BrowserLauncher, CallbackEndpoint, Token, TokenResponse, TokenStore};
use crate::api::{ApiRequest, ClassificationError, Result};
use crate::config::ClientConfig;

/// A token bound to an HTTP connection pool.
struct Session {
    http: Client,
    token: Token,
}

/// Snapshot of the active session handed to each API call.
///
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    api_url: String,
    token: Token,
}

impl AuthorizedClient {
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Send `request` with the bearer token.
    ///
    /// Fails with `TokenExpired` without touching the network when the
    /// token's expiry has passed, and when the API rejects the token as
    /// `invalid_token`. Every other response is returned as is.
    pub async fn send(&self, request: ApiRequest) -> Result<Response> {
        if self.token.is_expired() {
            return Err(ClassificationError::TokenExpired);
        }

        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "Sending API request");

        let mut builder = self
            .http
            .request(request.method, &url)
            .bearer_auth(&self.token.access_token)
            .header(header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        if is_invalid_token(&response) {
            return Err(ClassificationError::TokenExpired);
        }
        Ok(response)
    }
}

fn is_invalid_token(response: &Response) -> bool {
    response.status() == StatusCode::UNAUTHORIZED
        && response
            .headers()
            .get_all(header::WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains("invalid_token"))
}

/// Owns the OAuth2 session: login, persistence and refresh-on-expiry.
pub struct SessionManager {
    client_id: String,
    client_secret: String,
    callback: CallbackEndpoint,
    authorize_url: String,
    token_url: String,
    api_url: String,
    callback_timeout: Option<Duration>,
    request_timeout: Duration,
    store: TokenStore,
    launcher: Option<BrowserLauncher>,
    session: Option<Session>,
}

impl SessionManager {
    /// Create an uninitialized manager; call `initialize` or `with_token` next.
    pub fn new(config: &ClientConfig, store: TokenStore) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback: config.callback(),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            api_url: config.api_url.clone(),
            callback_timeout: config.callback_timeout(),
            request_timeout: config.request_timeout(),
            store,
            launcher: None,
            session: None,
        }
    }

    /// Use `launcher` instead of the system browser during login
    pub fn set_launcher(&mut self, launcher: BrowserLauncher) {
        self.launcher = Some(launcher);
    }

    pub fn set_callback(&mut self, callback: CallbackEndpoint) {
        self.callback = callback;
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Bind a session, reusing the saved token unless `force_new_token`.
    ///
    /// A missing or invalid saved token falls back to the browser login.
    pub async fn initialize(&mut self, force_new_token: bool) -> Result<()> {
        if !force_new_token {
            match self.store.load() {
                Ok(token) => {
                    debug!("Reusing saved token");
                    return self.with_token(token);
                }
                Err(ClassificationError::TokenUnavailable(reason)) => {
                    info!(reason = %reason, "Saved token unavailable, starting login");
                }
                Err(e) => return Err(e),
            }
        }

        let http = self.build_http()?;
        let mut flow = AuthorizationFlow::new(
            http,
            self.client_id.clone(),
            self.client_secret.clone(),
            self.callback.clone(),
            self.authorize_url.clone(),
            self.token_url.clone(),
        )
        .with_callback_timeout(self.callback_timeout);
        if let Some(ref launcher) = self.launcher {
            flow = flow.with_launcher(launcher.clone());
        }

        let token = flow.run(&self.store).await?;
        self.with_token(token)
    }

    /// Bind `token` directly, bypassing the store and the login flow
    pub fn with_token(&mut self, token: Token) -> Result<()> {
        token.ensure_usable()?;
        let http = self.build_http()?;
        self.session = Some(Session { http, token });
        Ok(())
    }

    /// Close the connection pool and forget the session.
    pub fn drop_session(&mut self) {
        if self.session.take().is_some() {
            debug!("Session dropped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn token(&self) -> Option<&Token> {
        self.session.as_ref().map(|s| &s.token)
    }

    pub fn authorized(&self) -> Result<AuthorizedClient> {
        let session = self.session.as_ref().ok_or(ClassificationError::NotInitialized)?;
        Ok(AuthorizedClient {
            http: session.http.clone(),
            api_url: self.api_url.clone(),
            token: session.token.clone(),
        })
    }

    /// Trade the refresh token for a new token, rebind and persist it.
    ///
    /// A failed save is returned, but the session already holds the new token.
    pub async fn refresh(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(ClassificationError::NotInitialized)?;

        let response = session
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.token.refresh_token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: TokenResponse = response.json().await?;
        session.token = Token::from_response(body, Some(&session.token))?;
        info!("Access token refreshed");

        // Rebound before saving; the old refresh token may already be revoked.
        self.store.save(&session.token)
    }

    /// Run `operation`, refreshing the token and retrying once if it
    /// reports `TokenExpired`.
    ///
    /// A second expiry, a failed refresh and every other error are returned
    /// unchanged.
    pub async fn call_with_refresh<T, F, Fut>(&mut self, mut operation: F) -> Result<T>
    where
        F: FnMut(AuthorizedClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self.authorized()?;
        match operation(client).await {
            Err(ClassificationError::TokenExpired) => {
                debug!("Token expired, refreshing before retry");
                self.refresh().await?;
                let client = self.authorized()?;
                operation(client).await
            }
            other => other,
        }
    }

    fn build_http(&self) -> Result<Client> {
        Ok(Client::builder().timeout(self.request_timeout).build()?)
    }
}

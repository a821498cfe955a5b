//! OAuth2 authorization-code login through the system browser.
//!
//! The flow binds a one-shot listener on the callback endpoint, sends the
//! user to the provider's authorize page, captures the `code` from the
//! single redirect it receives and trades it for a token.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Token, TokenResponse, TokenStore};
use crate::api::{ClassificationError, Result};

/// Largest callback request we are willing to buffer.
const MAX_CALLBACK_REQUEST_BYTES: usize = 16 * 1024;

/// Length of the random `state` value sent with the authorize request.
const STATE_LENGTH: usize = 32;

/// Opens a URL for the user. Failures are logged, never fatal.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Where the local redirect listener binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEndpoint {
    pub host: String,
    pub port: u16,
}

impl CallbackEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Redirect URI registered with the provider
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for CallbackEndpoint {
    fn default() -> Self {
        Self::new("localhost", 8080)
    }
}

/// Everything the login needs besides the token store.
#[derive(Clone)]
pub struct AuthorizationFlow {
    pub client_id: String,
    pub client_secret: String,
    pub callback: CallbackEndpoint,
    pub authorize_url: String,
    pub token_url: String,
    /// `None` waits for the redirect indefinitely.
    pub callback_timeout: Option<Duration>,
    http: Client,
    launcher: BrowserLauncher,
}

impl fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("client_id", &self.client_id)
            .field("callback", &self.callback)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("callback_timeout", &self.callback_timeout)
            .finish_non_exhaustive()
    }
}

impl AuthorizationFlow {
    pub fn new(
        http: Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback: CallbackEndpoint,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback,
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            callback_timeout: None,
            http,
            launcher: Arc::new(open_in_browser),
        }
    }

    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Replace the system browser launcher
    pub fn with_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Run the login and persist the resulting token.
    pub async fn run(&self, store: &TokenStore) -> Result<Token> {
        let listener =
            TcpListener::bind((self.callback.host.as_str(), self.callback.port)).await?;

        // Port 0 asks the OS for a free port; the redirect must name the real one.
        let callback = match self.callback.port {
            0 => CallbackEndpoint::new(self.callback.host.clone(), listener.local_addr()?.port()),
            _ => self.callback.clone(),
        };
        let redirect_uri = callback.redirect_uri();
        let state = random_state();

        let url = build_authorization_url(&self.authorize_url, &self.client_id, &redirect_uri, &state)?;

        info!(url = %url, "Open this URL to log in if no browser window appears");
        if let Err(e) = (self.launcher)(url.as_str()) {
            warn!(error = %e, "Failed to launch browser");
        }

        let code = wait_for_callback(listener, &state, self.callback_timeout).await?;
        debug!("Received authorization code");

        let token = exchange_code(
            &self.http,
            &self.token_url,
            &self.client_id,
            &self.client_secret,
            &redirect_uri,
            &code,
        )
        .await?;

        store.save(&token)?;
        info!("Login completed, token saved");
        Ok(token)
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

pub fn build_authorization_url(
    authorize_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(authorize_url).map_err(|e| {
        ClassificationError::Authorization(format!("invalid authorize URL {authorize_url}: {e}"))
    })?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state);
    Ok(url)
}

/// Open a URL with the platform's default handler.
pub fn open_in_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let status = std::process::Command::new("open").arg(url).status()?;

    #[cfg(target_os = "windows")]
    let status = std::process::Command::new("cmd")
        .args(["/C", "start", "", url])
        .status()?;

    #[cfg(all(unix, not(target_os = "macos")))]
    let status = std::process::Command::new("xdg-open").arg(url).status()?;

    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("browser launcher exited with {status}")))
    }
}

/// Accept exactly one request on `listener` and return its `code`.
///
/// `timeout` bounds the whole wait, reading the request included. The
/// listener is consumed and closed on return.
pub async fn wait_for_callback(
    listener: TcpListener,
    expected_state: &str,
    timeout: Option<Duration>,
) -> Result<String> {
    let deadline = timeout.map(|limit| (Instant::now() + limit, limit));

    let (mut stream, peer) = before_deadline(deadline, listener.accept()).await??;
    drop(listener);
    debug!(%peer, "Callback connection accepted");

    let target = before_deadline(deadline, read_request_target(&mut stream)).await??;
    let callback_url = Url::parse(&format!("http://localhost{target}")).map_err(|e| {
        ClassificationError::Authorization(format!("malformed callback request: {e}"))
    })?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in callback_url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    let outcome = if let Some(error) = error {
        Err(format!("provider returned error: {error}"))
    } else if state.as_deref() != Some(expected_state) {
        Err("callback state mismatch".to_string())
    } else {
        code.ok_or_else(|| "'code' query parameter is missing in response".to_string())
    };

    match outcome {
        Ok(code) => {
            write_callback_page(&mut stream, "200 OK", "Login successful. You can close this tab.")
                .await?;
            Ok(code)
        }
        Err(reason) => {
            write_callback_page(&mut stream, "400 Bad Request", "Login failed. You can close this tab.")
                .await?;
            Err(ClassificationError::Authorization(reason))
        }
    }
}

async fn before_deadline<T>(
    deadline: Option<(Instant, Duration)>,
    future: impl Future<Output = T>,
) -> Result<T> {
    match deadline {
        Some((at, limit)) => tokio::time::timeout_at(at, future).await.map_err(|_| {
            ClassificationError::Authorization(format!(
                "no callback received within {}s",
                limit.as_secs_f64()
            ))
        }),
        None => Ok(future.await),
    }
}

async fn read_request_target(stream: &mut TcpStream) -> Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0_u8; 1024];

    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_CALLBACK_REQUEST_BYTES {
            break;
        }
    }

    let request = String::from_utf8_lossy(&buffer);
    let request_line = request
        .lines()
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| ClassificationError::Authorization("empty callback request".to_string()))?;

    let mut parts = request_line.split_whitespace();
    let _method = parts.next();
    parts
        .next()
        .map(str::to_string)
        .ok_or_else(|| ClassificationError::Authorization("callback request target missing".to_string()))
}

async fn write_callback_page(stream: &mut TcpStream, status: &str, message: &str) -> Result<()> {
    let body = format!("<!DOCTYPE html><html><body><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Trade an authorization code for a token.
pub async fn exchange_code(
    http: &Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<Token> {
    let response = http
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await?
        .error_for_status()?;

    let body: TokenResponse = response.json().await?;
    Token::from_response(body, None)
}

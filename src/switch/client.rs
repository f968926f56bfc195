//! Switch web interface client.
//!
//! This module provides the HTTP session for the GS316EP web UI: the
//! salted-MD5 login handshake, token caching, and token attachment on
//! every request.

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Proxy, redirect};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::{AuthError, Result, TransportError};

use super::scrape;
use super::token::TokenCache;
use super::transport::{RawResponse, SwitchTransport};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Timeout for the firmware upload, which takes a few minutes.
const UPLOAD_TIMEOUT_SECS: u64 = 600;

/// Name of the token parameter the device expects.
const TOKEN_FIELD: &str = "Gambit";

/// Minimum size of a logged-in home page.
const HOMEPAGE_MIN_LEN: usize = 250;

/// Options for building a [`SwitchClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Optional HTTP or SOCKS proxy.
    pub proxy_url: Option<String>,
    /// Token cache; `None` disables caching.
    pub token_cache: Option<TokenCache>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy_url: None,
            token_cache: None,
        }
    }
}

/// Authenticated session with one switch.
#[derive(Debug)]
pub struct SwitchClient {
    /// HTTP client.
    client: Client,
    /// `http://host:port`, without trailing slash.
    base_url: String,
    /// Current session token.
    token: Option<String>,
    /// Password of the last successful login, kept for re-login.
    password: Option<String>,
    /// Token cache.
    token_cache: Option<TokenCache>,
}

impl SwitchClient {
    /// Creates a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str, options: ClientOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .redirect(redirect::Policy::none());

        if let Some(proxy_url) = &options.proxy_url {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| TransportError::network(format!("Invalid proxy URL {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            password: None,
            token_cache: options.token_cache,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current session token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Logs in, reusing a fresh cached token when the device still accepts it.
    ///
    /// # Errors
    ///
    /// Returns an error if the login page is malformed or the password is rejected.
    pub async fn login(&mut self, password: &str) -> Result<()> {
        self.password = Some(password.to_string());

        if let Some(cached) = match &self.token_cache {
            Some(cache) => cache.load_fresh().await,
            None => None,
        } {
            self.token = Some(cached.token);
            if self.token_valid().await? {
                info!("Reusing cached session token");
                return Ok(());
            }
            debug!("Cached token rejected by the device, logging in again");
            self.token = None;
        }

        self.fresh_login(password).await
    }

    /// Logs in again with the password of the last login.
    ///
    /// # Errors
    ///
    /// Returns an error if no password is known or the login fails.
    pub async fn relogin(&mut self) -> Result<()> {
        let password = self.password.clone().ok_or(AuthError::MissingPassword)?;
        self.token = None;
        self.fresh_login(&password).await
    }

    /// Performs the login handshake without consulting the cache.
    async fn fresh_login(&mut self, password: &str) -> Result<()> {
        info!("Logging in to {}", self.base_url);

        let page = self.send(Method::GET, "/", None).await?;
        if !page.is_ok() {
            return Err(AuthError::LoginPage {
                status: page.status,
            }
            .into());
        }

        let rand = scrape::extract_login_rand(&page.body).map_err(|e| {
            AuthError::MalformedLoginPage {
                message: e.to_string(),
            }
        })?;

        let form = [("LoginPassword", login_hash(password, &rand))];
        let response = self.send(Method::POST, "/redirect.html", Some(&form)).await?;
        if !response.is_ok() {
            return Err(AuthError::LoginPage {
                status: response.status,
            }
            .into());
        }

        if !scrape::login_succeeded(&response.body) {
            let message = scrape::extract_login_error(&response.body)
                .unwrap_or_else(|| String::from("Wrong Password"));
            return Err(AuthError::Rejected { message }.into());
        }

        let token = scrape::extract_token(&response.body).map_err(|e| {
            AuthError::MalformedLoginPage {
                message: e.to_string(),
            }
        })?;

        if let Some(cache) = &self.token_cache {
            if let Err(e) = cache.store(&token, &self.base_url).await {
                warn!("Failed to cache session token: {e}");
            }
        }

        self.token = Some(token);
        info!("Logged in successfully");
        Ok(())
    }

    /// Checks whether the device still accepts the current token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn token_valid(&self) -> Result<bool> {
        if self.token.is_none() {
            return Ok(false);
        }
        let response = self.send(Method::GET, "/homepage.html", None).await?;
        Ok(response.is_ok() && response.body.len() >= HOMEPAGE_MIN_LEN)
    }

    /// Uploads a firmware image as multipart form data.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the request fails.
    pub async fn upload_firmware(
        &self,
        path: &str,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<RawResponse> {
        let token = self.token.clone().ok_or(AuthError::NotLoggedIn)?;

        let part = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::network(format!("Invalid firmware part: {e}")))?;
        let form = Form::new()
            .text(TOKEN_FIELD, token.clone())
            .part("fileField", part);

        info!("Uploading firmware image {file_name}");
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .query(&[(TOKEN_FIELD, token.as_str())])
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::network(format!("POST {path} failed: {e}")))?;

        Self::read_response(response, "POST", path).await
    }

    /// Sends one request, attaching the token when logged in.
    async fn send(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<RawResponse> {
        trace!("{method} {path}");

        let mut request = self
            .client
            .request(method.clone(), format!("{}{path}", self.base_url));

        if let Some(token) = &self.token {
            request = request.query(&[(TOKEN_FIELD, token.as_str())]);
        }

        if let Some(form) = form {
            let mut fields: Vec<(&str, &str)> =
                form.iter().map(|(k, v)| (*k, v.as_str())).collect();
            if let Some(token) = &self.token {
                fields.push((TOKEN_FIELD, token.as_str()));
            }
            request = request.form(&fields);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(format!("{method} {path} failed: {e}")))?;

        Self::read_response(response, method.as_str(), path).await
    }

    async fn read_response(
        response: reqwest::Response,
        method: &str,
        path: &str,
    ) -> Result<RawResponse> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            TransportError::network(format!("Failed to read {method} {path} response: {e}"))
        })?;
        debug!("{method} {path} -> {status} ({} bytes)", body.len());
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl SwitchTransport for SwitchClient {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        self.send(Method::GET, path, None).await
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<RawResponse> {
        self.send(Method::POST, path, Some(form)).await
    }
}

/// Interleaves password and salt character by character, then MD5-hex encodes.
#[must_use]
pub fn login_hash(password: &str, rand: &str) -> String {
    let mut merged = String::with_capacity(password.len() + rand.len());
    let mut left = password.chars();
    let mut right = rand.chars();

    loop {
        let a = left.next();
        let b = right.next();
        if a.is_none() && b.is_none() {
            break;
        }
        merged.extend(a);
        merged.extend(b);
    }

    hex::encode(Md5::digest(merged.as_bytes()))
}

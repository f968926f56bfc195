//! Transport trait definition.
//!
//! This module defines the request interface the VLAN, PoE and mirroring
//! operations are written against.

use async_trait::async_trait;

use crate::error::Result;

/// Status and body of a device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl RawResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for HTTP 200.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Trait for sending requests to an authenticated switch session.
///
/// Implementations attach the session token to every request.
#[async_trait]
pub trait SwitchTransport: Send + Sync {
    /// Sends a GET request.
    async fn get(&self, path: &str) -> Result<RawResponse>;

    /// Sends a form-encoded POST request.
    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<RawResponse>;
}


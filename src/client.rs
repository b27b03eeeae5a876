//! Blocking HTTP clients for Upwork and Wave.
//!
//! Both clients are built the same way: a builder takes the bearer token
//! and optional base URL overrides (used by tests to point at a mock
//! server). Tokens are held as [`SecretString`] and never logged.

pub mod upwork;
pub mod wave;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret as _, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{LongboardError, Result};

pub use upwork::{UpworkClient, UpworkClientBuilder};
pub use wave::{WaveClient, WaveClientBuilder};

/// Builds the underlying blocking HTTP client.
fn http_client() -> Result<Client> {
    Ok(Client::builder().build()?)
}

/// Joins `base` and `path` into a URL, appending `params` as a query.
fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let raw = format!("{}{path}", base.trim_end_matches('/'));
    Url::parse_with_params(&raw, params)
        .map_err(|err| LongboardError::Config(format!("invalid URL `{raw}`: {err}")))
}

/// Sends an authenticated request and deserializes a successful response.
fn send_json<Resp: DeserializeOwned>(request: RequestBuilder, token: &SecretString) -> Result<Resp> {
    let response = request
        .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
        .header(ACCEPT, "application/json")
        .send()?;

    let status = response.status();
    tracing::debug!(status = %status, "received response");
    if status.is_success() {
        let body = response.text()?;
        tracing::trace!(body_len = body.len(), "parsing response body");
        serde_json::from_str(&body).map_err(LongboardError::from)
    } else {
        let message = response
            .text()
            .unwrap_or_else(|_| "unknown error".to_owned());
        tracing::debug!(status = status.as_u16(), message = %message, "API error");
        Err(LongboardError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

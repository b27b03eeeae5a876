//! Upwork REST client.

use reqwest::blocking::Client;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use super::{endpoint, http_client, send_json};
use crate::dates::ISO_DATE_FORMAT;
use crate::error::{LongboardError, Result};
use crate::models::{NaiveDate, ReportResponse};
use crate::platform::SourcePlatform;

/// Base URL for the Upwork API.
const DEFAULT_BASE_URL: &str = "https://www.upwork.com";

/// Teams endpoint path.
const TEAMS_PATH: &str = "/api/hr/v2/teams.json";

/// Financial report endpoint path prefix.
const FINANCIAL_REPORT_PATH: &str = "/api/finreports/v2/financial_account/";

/// Builds the report query selecting `fields` between two dates.
#[must_use]
pub fn report_query(fields: &str, from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "SELECT {fields} WHERE date >= '{}' AND date <= '{}'",
        from.format(ISO_DATE_FORMAT),
        to.format(ISO_DATE_FORMAT)
    )
}

/// Body of the teams endpoint.
#[derive(Debug, Deserialize)]
struct TeamsEnvelope {
    /// Team list; a single team may arrive as a bare object.
    #[serde(default)]
    teams: Value,
}

/// Builder for constructing an [`UpworkClient`].
#[derive(Debug)]
pub struct UpworkClientBuilder {
    /// Access token for API authentication.
    token: Option<SecretString>,
    /// Base URL override (for testing).
    base_url: Option<String>,
}

impl UpworkClientBuilder {
    /// Sets the access token for API authentication.
    #[inline]
    #[must_use]
    pub fn token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Overrides the base URL (useful for testing with a mock server).
    #[inline]
    #[must_use]
    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`LongboardError::Config`] if no token was provided.
    /// Returns [`LongboardError::Http`] if the HTTP client fails to build.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub fn build(self) -> Result<UpworkClient> {
        let token = self
            .token
            .ok_or_else(|| LongboardError::Config("Upwork token is required".to_owned()))?;
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        tracing::debug!(base_url = %base_url, "building Upwork client");
        Ok(UpworkClient {
            http: http_client()?,
            token,
            base_url,
        })
    }
}

/// Blocking client for the Upwork API.
///
/// Use [`UpworkClient::builder()`] to construct an instance.
#[derive(Debug)]
pub struct UpworkClient {
    /// Underlying HTTP client.
    http: Client,
    /// Bearer access token.
    token: SecretString,
    /// API base URL.
    base_url: String,
}

impl UpworkClient {
    /// Creates a new builder for configuring the client.
    #[inline]
    #[must_use]
    pub const fn builder() -> UpworkClientBuilder {
        UpworkClientBuilder {
            token: None,
            base_url: None,
        }
    }

    /// Sends an authenticated GET request and deserializes the response.
    #[tracing::instrument(skip_all, fields(path = %path))]
    fn get_json<Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Resp> {
        let url = endpoint(&self.base_url, path, params)?;
        tracing::trace!(path = url.path(), "sending GET request");
        send_json(self.http.get(url), &self.token)
    }
}

impl SourcePlatform for UpworkClient {
    #[tracing::instrument(skip_all)]
    fn teams(&self) -> Result<Option<Vec<Value>>> {
        let envelope: TeamsEnvelope = self.get_json(TEAMS_PATH, &[])?;
        Ok(match envelope.teams {
            Value::Array(teams) => Some(teams),
            team @ Value::Object(_) => Some(vec![team]),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
        })
    }

    #[tracing::instrument(skip_all, fields(from = %from, to = %to))]
    fn report_transactions(
        &self,
        entity_ref: &str,
        from: NaiveDate,
        to: NaiveDate,
        fields: &str,
    ) -> Result<ReportResponse> {
        let path = format!("{FINANCIAL_REPORT_PATH}{entity_ref}.json");
        let query = report_query(fields, from, to);
        tracing::debug!(query = %query, "requesting financial report");
        self.get_json(&path, &[("tq", query.as_str())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn builder_requires_token() {
        let result = UpworkClient::builder().build();
        assert!(matches!(result.unwrap_err(), LongboardError::Config(_)));
    }

    #[test]
    fn builder_with_token_succeeds() {
        let client = UpworkClient::builder().token("test-token").build().unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_custom_base_url() {
        let client = UpworkClient::builder()
            .token("test-token")
            .base_url("http://localhost:8080")
            .build()
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn debug_output_hides_token() {
        let client = UpworkClient::builder().token("s3cr3t").build().unwrap();
        assert!(!format!("{client:?}").contains("s3cr3t"));
    }

    #[test]
    fn report_query_format() {
        let query = report_query(
            "reference, amount",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        assert_eq!(
            query,
            "SELECT reference, amount WHERE date >= '2024-01-01' AND date <= '2024-01-31'"
        );
    }

    // ── mock server tests ────────────────────────────────────────────

    fn mock_client(uri: String) -> UpworkClient {
        UpworkClient::builder()
            .token("test-token")
            .base_url(uri)
            .build()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn teams_sends_bearer_and_parses_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEAMS_PATH))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "teams": [
                    {"reference": "T1", "company_name": "Acme", "name": "Jane Doe"},
                    {"reference": "T2", "company_name": "Globex", "name": "Hank"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let teams = tokio::task::spawn_blocking(move || mock_client(uri).teams())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[1]["company_name"], "Globex");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn teams_single_object_and_missing_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEAMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "teams": {"reference": "T1", "company_name": "Acme", "name": "Jane"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(TEAMS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"server_time": 1})))
            .mount(&server)
            .await;

        let uri = server.uri();
        let (single, missing) = tokio::task::spawn_blocking(move || {
            let client = mock_client(uri);
            (client.teams(), client.teams())
        })
        .await
        .unwrap();
        assert_eq!(single.unwrap().map(|teams| teams.len()), Some(1));
        assert_eq!(missing.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn report_sends_query_and_parses_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/finreports/v2/financial_account/acct-ref.json"))
            .and(query_param(
                "tq",
                "SELECT reference, amount WHERE date >= '2024-01-01' AND date <= '2024-01-31'",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "table": {
                    "cols": [{"label": "reference"}, {"label": "amount"}],
                    "rows": [{"c": [{"v": "R1"}, {"v": "87.50"}]}]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let response = tokio::task::spawn_blocking(move || {
            mock_client(uri).report_transactions(
                "acct-ref",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                "reference, amount",
            )
        })
        .await
        .unwrap()
        .unwrap();
        let records = crate::models::flatten(&response);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("amount").map(String::as_str), Some("87.50"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEAMS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&server)
            .await;

        let uri = server.uri();
        let err = tokio::task::spawn_blocking(move || mock_client(uri).teams())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            LongboardError::Api { status: 401, message } if message == "token expired"
        ));
    }
}

//! HTTP transport for devices exposing a RESTCONF-style API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::synth::{HttpMethod, RestRequest};
use crate::transport::{RawFacts, Transport};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport backed by a device's HTTP management API.
///
/// Facts are read from `GET {endpoint}/data/{kind}`; CLI batches go to
/// `POST {endpoint}/cli`; REST batches are dispatched request by request
/// against `{endpoint}{path}`.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl RestTransport {
    /// Creates a transport for the given device endpoint.
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be created.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a transport with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be created.
    pub fn with_timeout(endpoint: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn dispatch(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| TransportError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::AuthenticationFailed {
                message: format!("Device rejected credentials ({status})"),
            }
            .into());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::request(status.as_u16(), message).into());
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn get_facts(&self, kind: &str) -> Result<RawFacts> {
        let url = format!("{}/data/{kind}", self.endpoint);
        debug!(%url, "fetching facts");

        let response = self.dispatch(self.client.get(&url)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(RawFacts::Json(serde_json::Value::Null));
        }

        let body = response.json::<serde_json::Value>().await.map_err(|e| {
            TransportError::InvalidResponse {
                message: format!("Facts payload is not JSON: {e}"),
            }
        })?;
        Ok(RawFacts::Json(body))
    }

    async fn edit_config(&self, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let url = format!("{}/cli", self.endpoint);
        debug!(count = commands.len(), "sending CLI batch");
        trace!(?commands);

        self.dispatch(
            self.client
                .post(&url)
                .json(&serde_json::json!({ "commands": commands })),
        )
        .await?;
        Ok(())
    }

    async fn send_requests(&self, requests: &[RestRequest]) -> Result<()> {
        for request in requests {
            let url = format!("{}{}", self.endpoint, request.path);
            debug!(method = %request.method, %url, "sending request");

            let builder = match request.method {
                HttpMethod::Post => self.client.post(&url),
                HttpMethod::Patch => self.client.patch(&url),
                HttpMethod::Put => self.client.put(&url),
                HttpMethod::Delete => self.client.delete(&url),
            };
            let builder = match &request.body {
                Some(body) => builder.json(body),
                None => builder,
            };
            self.dispatch(builder).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_facts_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/vlans"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
            .mount(&server)
            .await;

        let transport = RestTransport::new(&server.uri(), Some("sekrit".into())).unwrap();
        let facts = transport.get_facts("vlans").await.unwrap();
        let RawFacts::Json(value) = facts else {
            panic!("expected JSON facts");
        };
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = RestTransport::new(&server.uri(), None).unwrap();
        let err = transport.get_facts("vlans").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ConvergeError::Transport(TransportError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_edit_config_posts_command_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cli"))
            .and(body_json(serde_json::json!({"commands": ["vlan 10", "name ten"]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RestTransport::new(&server.uri(), None).unwrap();
        transport
            .edit_config(&["vlan 10".into(), "name ten".into()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_requests_dispatches_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/data/acl/acl-sets/acl-set=edge"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RestTransport::new(&server.uri(), None).unwrap();
        transport
            .send_requests(&[RestRequest::delete("/data/acl/acl-sets/acl-set=edge")])
            .await
            .unwrap();
    }
}

//! HTTP side of the lookup protocol
//!
//! The lookup needs a session that survives both requests (the select page
//! reads state set by the address page), and nothing shared between
//! addresses. [`FormTransport`] hands out one [`FormSession`] per lookup.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::address::AddressKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

#[async_trait]
pub trait FormTransport: Send + Sync {
    /// Start an isolated session for one address
    async fn open_session(&self) -> Result<Box<dyn FormSession>, TransportError>;
}

#[async_trait]
pub trait FormSession: Send {
    /// Step one: submit the address, returning the page carrying the selection form
    async fn submit_address(&mut self, key: &AddressKey) -> Result<String, TransportError>;

    /// Step two: post the selection form, returning the results page
    async fn submit_form(&mut self, fields: &[(String, String)]) -> Result<String, TransportError>;
}

/// Everything the reqwest transport needs, resolved from configuration
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub lookup_url: String,
    pub select_url: String,
    pub street_separator: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

/// Form-urlencode one value (spaces become `+`)
fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Encode a street for the lookup query: each word encoded, words joined by `separator`
pub fn encode_street(street: &str, separator: &str) -> String {
    street
        .split(' ')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Lookup URL for an address: `base` plus the borough id, house number and street parameters
pub fn build_lookup_url(base: &str, key: &AddressKey, separator: &str) -> String {
    let joiner = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}p1={}&p2={}&p3={}",
        base,
        joiner,
        key.borough().form_id(),
        encode_component(key.house_number()),
        encode_street(key.street(), separator)
    )
}

/// Production transport backed by reqwest
pub struct ReqwestTransport {
    settings: Arc<TransportSettings>,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl FormTransport for ReqwestTransport {
    async fn open_session(&self) -> Result<Box<dyn FormSession>, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Box::new(ReqwestSession {
            client,
            settings: self.settings.clone(),
        }))
    }
}

struct ReqwestSession {
    client: reqwest::Client,
    settings: Arc<TransportSettings>,
}

impl ReqwestSession {
    async fn read_body(url: &str, response: Result<reqwest::Response, reqwest::Error>) -> Result<String, TransportError> {
        let response = response.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: format!("failed to read response body: {}", e),
        })
    }
}

#[async_trait]
impl FormSession for ReqwestSession {
    async fn submit_address(&mut self, key: &AddressKey) -> Result<String, TransportError> {
        let url = build_lookup_url(&self.settings.lookup_url, key, &self.settings.street_separator);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await;
        Self::read_body(&url, response).await
    }

    async fn submit_form(&mut self, fields: &[(String, String)]) -> Result<String, TransportError> {
        let url = &self.settings.select_url;
        debug!("POST {} ({} fields)", url, fields.len());
        let response = self.client.post(url).form(fields).send().await;
        Self::read_body(url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Borough;

    #[test]
    fn test_encode_street_uses_separator() {
        assert_eq!(encode_street("west 73", "+"), "west+73");
        assert_eq!(encode_street("st. mark's place", "+"), "st.+mark%27s+place");
        assert_eq!(encode_street("broadway", "+"), "broadway");
    }

    #[test]
    fn test_encode_street_custom_separator() {
        assert_eq!(encode_street("grand concourse", "%20"), "grand%20concourse");
    }

    #[test]
    fn test_build_lookup_url_appends_to_existing_query() {
        let key = AddressKey::new("270", "west 73", Borough::Manhattan);
        let url = build_lookup_url("https://example.test/provide_address.aspx?required=p2", &key, "+");
        assert_eq!(
            url,
            "https://example.test/provide_address.aspx?required=p2&p1=1&p2=270&p3=west+73"
        );
    }

    #[test]
    fn test_build_lookup_url_without_query() {
        let key = AddressKey::new("12-34", "38 avenue", Borough::Queens);
        let url = build_lookup_url("http://localhost/lookup", &key, "+");
        assert_eq!(url, "http://localhost/lookup?p1=4&p2=12-34&p3=38+avenue");
    }
}

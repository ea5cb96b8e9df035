//! Blocking `reqwest` implementation of [`HttpClient`].

use crate::config::CatalogConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::http::{HttpCatalogClient, HttpClient, HttpRequest, HttpResponse, Method};
use reqwest::blocking::Client;

/// An [`HttpClient`] backed by a blocking `reqwest` client.
///
/// The request timeout and user agent come from [`CatalogConfig`]. Redirects
/// follow reqwest's default policy.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Builds a client from the configuration.
    pub fn new(config: &CatalogConfig) -> ReconcileResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                ReconcileError::InvalidConfig(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// Connects to a catalog service over HTTPS.
pub fn connect(config: CatalogConfig) -> ReconcileResult<HttpCatalogClient<ReqwestClient>> {
    let client = ReqwestClient::new(&config)?;
    HttpCatalogClient::new(config, client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn connect_validates_config() {
        let result = connect(CatalogConfig::new("https://catalog.example.com").with_page_size(0));
        assert!(matches!(result, Err(ReconcileError::InvalidConfig(_))));
    }

    #[test]
    fn connect_builds_client() {
        let client = connect(
            CatalogConfig::new("https://catalog.example.com").with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn unreachable_host_is_transport_failure() {
        let client = ReqwestClient::new(
            &CatalogConfig::default().with_timeout(Duration::from_millis(500)),
        )
        .unwrap();
        let request = HttpRequest {
            method: Method::Get,
            url: "http://127.0.0.1:9/v2/catalog_entries".into(),
            headers: vec![],
            body: None,
        };
        assert!(client.send(&request).is_err());
    }
}

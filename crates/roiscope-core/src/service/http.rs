//! ROI service over the image server's HTTP endpoints.
//!
//! Requests are blocking; drive the returned futures from a thread that may
//! block (or a blocking task of an async runtime).

use super::{BoxFuture, RoiService, ServiceError, ServiceResult};
use crate::codec::{RoiJson, SaveRequest, SaveResponse};
use crate::config::{ConfigError, RegionsConfig};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to `GET <server>/rois?image=<id>` and `POST <server>/rois`.
#[derive(Debug, Clone)]
pub struct HttpRoiService {
    agent: ureq::Agent,
    config: RegionsConfig,
}

impl HttpRoiService {
    /// Create a service for the configured server.
    pub fn new(config: RegionsConfig) -> Result<Self, ConfigError> {
        let url = config.save_endpoint()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Parse(format!(
                "Invalid server URL scheme: {}",
                url.scheme()
            )));
        }
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self { agent, config })
    }

    pub fn config(&self) -> &RegionsConfig {
        &self.config
    }
}

fn endpoint(url: Result<Url, ConfigError>) -> ServiceResult<Url> {
    url.map_err(|e| ServiceError::Other(e.to_string()))
}

fn request_error(url: &Url, error: ureq::Error, image_id: i64) -> ServiceError {
    match error {
        ureq::Error::Status(404, _) => ServiceError::NotFound(image_id),
        ureq::Error::Status(400, response) => {
            let body = response.into_string().unwrap_or_default();
            ServiceError::Serialization(format!("{url} rejected the request: {body}"))
        }
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            ServiceError::Network(format!("{url} answered {code}: {body}"))
        }
        ureq::Error::Transport(transport) => ServiceError::Network(format!("{url}: {transport}")),
    }
}

impl RoiService for HttpRoiService {
    fn fetch_rois(&self, image_id: i64) -> BoxFuture<'_, ServiceResult<Vec<RoiJson>>> {
        Box::pin(async move {
            let url = endpoint(self.config.rois_endpoint(image_id))?;
            log::debug!("GET {url}");
            let response = self
                .agent
                .request_url("GET", &url)
                .call()
                .map_err(|e| request_error(&url, e, image_id))?;
            response
                .into_json()
                .map_err(|e| ServiceError::Serialization(format!("Invalid ROI list from {url}: {e}")))
        })
    }

    fn save_rois(&self, request: &SaveRequest) -> BoxFuture<'_, ServiceResult<SaveResponse>> {
        let request = request.clone();
        Box::pin(async move {
            let url = endpoint(self.config.save_endpoint())?;
            log::debug!("POST {url} ({} ROIs)", request.rois.len());
            let response = self
                .agent
                .request_url("POST", &url)
                .send_json(&request)
                .map_err(|e| request_error(&url, e, request.image_id))?;
            response
                .into_json()
                .map_err(|e| ServiceError::Serialization(format!("Invalid save response from {url}: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::block_on;

    fn config(server_url: &str) -> RegionsConfig {
        RegionsConfig {
            server_url: server_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = HttpRoiService::new(config("ws://localhost:4080"));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unreachable_server_is_network_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let service = HttpRoiService::new(config(&format!("http://127.0.0.1:{port}"))).unwrap();
        let result = block_on(service.fetch_rois(1));
        assert!(matches!(result, Err(ServiceError::Network(_))));
    }
}

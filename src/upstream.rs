//! HTTP access to the YouTube Data API.

use std::time::Duration;

use crate::{error::LookupError, video::ListResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One upstream call: a sub-resource of the API base plus its query
/// parameters. The API key is appended by the client, never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub resource: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Seam between the lookup service and the network.
///
/// Implementations block; the service always calls them from
/// `spawn_blocking`.
pub trait VideoApi: Send + Sync {
    fn fetch(&self, request: &UpstreamRequest, api_key: &str) -> Result<ListResponse, LookupError>;
}

pub struct HttpVideoApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpVideoApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource.trim_start_matches('/'))
    }
}

impl VideoApi for HttpVideoApi {
    fn fetch(
        &self,
        request: &UpstreamRequest,
        api_key: &str,
    ) -> Result<ListResponse, LookupError> {
        // Intermediaries must not answer from their own caches.
        let mut call = self
            .agent
            .get(&self.url_for(request.resource))
            .set("Accept", "application/json")
            .set("Cache-Control", "no-cache, no-store")
            .set("Pragma", "no-cache");
        for (name, value) in &request.params {
            call = call.query(name, value);
        }
        call = call.query("key", api_key);

        match call.call() {
            // Unfollowed redirects and other non-2xx statuses below 400 land here.
            Ok(response) if !(200..300).contains(&response.status()) => {
                let status = response.status();
                let body = response.into_string().unwrap_or_default();
                Err(LookupError::from_upstream_response(status, &body))
            }
            Ok(response) => response
                .into_json::<ListResponse>()
                .map_err(|err| LookupError::InvalidResponse(err.to_string())),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(LookupError::from_upstream_response(status, &body))
            }
            // Transport errors render the full URL, key included, so only the
            // kind and message are kept.
            Err(ureq::Error::Transport(transport)) => {
                let message = match transport.message() {
                    Some(detail) => format!("{}: {detail}", transport.kind()),
                    None => transport.kind().to_string(),
                };
                Err(LookupError::unreachable(message))
            }
        }
    }
}

//! Production executor backed by a blocking `ureq` agent.

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};
use ureq::{Agent, RequestBuilder};

use crate::http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse, TransportError};

/// Issues real HTTPS requests. Error statuses come back as responses so the
/// dispatcher can decode the API error body itself.
#[derive(Clone)]
pub struct UreqExecutor {
    agent: Agent,
    timeout: Duration,
}

impl UreqExecutor {
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ureq::Error> {
        let url = request.url.as_str();
        let body = request.body.as_deref();
        let mut response = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &request.headers).call()?,
            HttpMethod::Delete => with_headers(self.agent.delete(url), &request.headers).call()?,
            HttpMethod::Post => send_body(with_headers(self.agent.post(url), &request.headers), body)?,
            HttpMethod::Put => send_body(with_headers(self.agent.put(url), &request.headers), body)?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl fmt::Debug for UreqExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqExecutor")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpExecutor for UreqExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match self.send(request) {
            Ok(response) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    "request completed"
                );
                Ok(response)
            }
            Err(err) => {
                warn!(method = %request.method, url = %request.url, error = %err, "request failed");
                Err(err.into())
            }
        }
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body),
        None => builder.send_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let executor = UreqExecutor::new(Duration::from_secs(2));
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: format!("http://127.0.0.1:{port}/v1/subscribers/1"),
            headers: Vec::new(),
            body: None,
        };
        assert!(executor.execute(&request).is_err());
    }

    #[test]
    fn keeps_configured_timeout() {
        assert_eq!(
            UreqExecutor::new(Duration::from_secs(10)).timeout(),
            Duration::from_secs(10)
        );
    }
}

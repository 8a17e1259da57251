//! Request dispatcher for the subscriber API.
//!
//! # Design
//! Every endpoint goes through `Client::call`, which is split into two pure
//! halves around the executor: `build_request` serializes the payload and
//! composes headers, `parse_response` classifies the status and decodes the
//! body. Only the executor performs I/O, and the client holds nothing but
//! read-only configuration, so one client can serve concurrent callers.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ApiError, Error, Result};
use crate::http::{HttpExecutor, HttpMethod, HttpRequest, HttpResponse};
use crate::transport::UreqExecutor;

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_PLATFORM: &str = "X-Platform";
pub const HEADER_SANDBOX: &str = "X-Is-Sandbox";

/// Payload argument for calls that send no body.
pub const NO_BODY: Option<&()> = None;

/// Shape a success body is decoded into.
///
/// `()` means no destination: the body is ignored whatever it contains.
/// [`Json`] decodes the body as JSON.
pub trait ResponseBody: Sized {
    fn decode(body: &str) -> serde_json::Result<Self>;
}

impl ResponseBody for () {
    fn decode(_body: &str) -> serde_json::Result<Self> {
        Ok(())
    }
}

/// Destination that decodes a success body into `T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> ResponseBody for Json<T> {
    fn decode(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body).map(Json)
    }
}

/// Authenticated client for the subscriber API.
#[derive(Debug, Clone)]
pub struct Client<E = UreqExecutor> {
    config: ClientConfig,
    executor: E,
}

impl Client<UreqExecutor> {
    /// Client backed by a real HTTP agent honoring `config.timeout`.
    pub fn new(config: ClientConfig) -> Self {
        let executor = UreqExecutor::new(config.timeout);
        Self { config, executor }
    }
}

impl<E: HttpExecutor> Client<E> {
    pub fn with_executor(config: ClientConfig, executor: E) -> Self {
        Self { config, executor }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Perform one round trip: build, execute, parse.
    ///
    /// An empty `platform` is treated the same as `None`: no `X-Platform`
    /// header is sent.
    pub fn call<B, R>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        platform: Option<&str>,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: ResponseBody,
    {
        let request = self.build_request(method, path, body, platform)?;
        let response = self.executor.execute(&request).map_err(Error::Transport)?;
        parse_response(&response)
    }

    pub fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        platform: Option<&str>,
    ) -> Result<HttpRequest>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(Error::Encoding)?;

        let mut headers = vec![
            (
                HEADER_AUTHORIZATION.to_string(),
                format!("Bearer {}", self.config.api_key),
            ),
            (HEADER_CONTENT_TYPE.to_string(), "application/json".to_string()),
        ];
        if let Some(platform) = platform.filter(|p| !p.is_empty()) {
            headers.push((HEADER_PLATFORM.to_string(), platform.to_string()));
        }
        if self.config.sandbox {
            headers.push((HEADER_SANDBOX.to_string(), "true".to_string()));
        }

        Ok(HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url, path),
            headers,
            body,
        })
    }

    pub fn parse_response<R: ResponseBody>(&self, response: &HttpResponse) -> Result<R> {
        parse_response(response)
    }
}

/// Statuses >= 400 decode into `ApiError`; anything else decodes into `R`.
fn parse_response<R: ResponseBody>(response: &HttpResponse) -> Result<R> {
    if response.is_failure() {
        let err: ApiError = serde_json::from_str(&response.body).map_err(Error::Decoding)?;
        return Err(Error::Api(err));
    }
    R::decode(&response.body).map_err(Error::Decoding)
}

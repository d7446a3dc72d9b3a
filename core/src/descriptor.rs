//! Request and response value types.
//!
//! # Design
//! A `RequestDescriptor` describes one HTTP request as plain data. It is
//! built with chained setters, handed to the dispatcher by value, and never
//! mutated after submission; the envelope produced on success carries the
//! descriptor that was actually sent. All fields are owned so descriptors
//! move freely across spawned tasks.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::FailureReason;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single HTTP request described as plain data.
///
/// `url` must be absolute; the dispatcher hands it to the transport
/// unchanged. `timeout` and `cancel` are optional per-request overrides.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            cancel: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the content type.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, FailureReason> {
        let body = serde_json::to_string(value)
            .map_err(|e| FailureReason::Unknown(format!("request serialization failed: {e}")))?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A completed successful response, produced exactly once per dispatch.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// The descriptor as it was transmitted, defaults and hooks applied.
    pub request: RequestDescriptor,
}

impl ResponseEnvelope {
    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FailureReason> {
        serde_json::from_str(&self.body)
            .map_err(|e| FailureReason::Unknown(format!("response deserialization failed: {e}")))
    }
}

//! Descriptor builders for the todo test API.
//!
//! # Design
//! `TodoApi` is stateless — it holds only `base_url` and produces
//! `RequestDescriptor` values for the dispatcher to submit. Response decoding
//! goes through `ResponseEnvelope::json`, so this layer never touches the
//! network or a response body.

use crate::descriptor::{Method, RequestDescriptor};
use crate::error::FailureReason;
use crate::types::{CreateTodo, UpdateTodo};

/// Builds descriptors for the demo endpoints.
#[derive(Debug, Clone)]
pub struct TodoApi {
    base_url: String,
}

impl TodoApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET `/todos`, optionally capped with `_limit`.
    pub fn list(&self, limit: Option<u32>) -> RequestDescriptor {
        let url = match limit {
            Some(n) => format!("{}/todos?_limit={n}", self.base_url),
            None => format!("{}/todos", self.base_url),
        };
        RequestDescriptor::new(Method::Get, url)
    }

    /// POST `/todos` with a JSON payload.
    pub fn create(&self, input: &CreateTodo) -> Result<RequestDescriptor, FailureReason> {
        RequestDescriptor::new(Method::Post, format!("{}/todos", self.base_url)).json(input)
    }

    /// PATCH `/todos/{id}`: only fields present in the payload are applied.
    pub fn update(&self, id: u64, input: &UpdateTodo) -> Result<RequestDescriptor, FailureReason> {
        RequestDescriptor::new(Method::Patch, format!("{}/todos/{id}", self.base_url)).json(input)
    }

    /// PUT `/todos/{id}`: replaces the stored item wholesale.
    pub fn replace(&self, id: u64, input: &CreateTodo) -> Result<RequestDescriptor, FailureReason> {
        RequestDescriptor::new(Method::Put, format!("{}/todos/{id}", self.base_url)).json(input)
    }

    /// DELETE `/todos/{id}`.
    pub fn delete(&self, id: u64) -> RequestDescriptor {
        RequestDescriptor::new(Method::Delete, format!("{}/todos/{id}", self.base_url))
    }
}

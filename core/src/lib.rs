//! Async request dispatcher for a todo-style test API.
//!
//! # Overview
//! Builds immutable `RequestDescriptor` values and submits them through a
//! pluggable `Transport`, resolving each dispatch to exactly one terminal
//! outcome: a `ResponseEnvelope` or a `FailureReason`. Timeouts,
//! cooperative cancellation, fail-fast batch joins, and ordered
//! interception hooks all live in the `Dispatcher`; the wire round-trip is
//! delegated entirely to the transport (reqwest in production, scripted
//! mocks in tests).
//!
//! # Design
//! - `Dispatcher` carries no mutable state; configuration is fixed at build
//!   time through an explicit factory, never through process-wide globals.
//! - The transport trait keeps the core testable: every timeout, cancel,
//!   and interception property is asserted against a mock without sockets.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod cancel;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod todos;
pub mod transport;
pub mod types;

pub use cancel::{CancelSource, CancelToken};
pub use descriptor::{Method, RequestDescriptor, ResponseEnvelope};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::FailureReason;
pub use todos::TodoApi;
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};
pub use types::{CreateTodo, Todo, UpdateTodo};

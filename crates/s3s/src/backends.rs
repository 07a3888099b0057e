//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 The query service pours events in, the line sink lets records out.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency:
//! - [`QueryService`]: the trait for "send a query, get a stream". [`S3SelectService`] is the
//!   real one. Tests bring their own.
//! - [`EventStream`] / [`EventStreamWriter`]: the two ends of the pipe between the wire and us.
//! - [`LineSink`]: stdout, one record payload per line.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

pub(crate) mod event_stream;
mod line_sink;
mod query_service;
mod s3_select;

pub use event_stream::{EventStream, EventStreamWriter};
pub use line_sink::{LineSink, trim_newlines};
pub use query_service::{QueryService, submit};
pub use s3_select::{S3SelectService, build_client};

#[cfg(test)]
pub(crate) use query_service::tests::{FlakyService, the_request};

//! 🪣🔍 S3 Select Backend: asking the bucket to do the reading for us.
//!
//! INT. AWS CONSOLE. NIGHT. A lone gzipped CSV sits in us-east-1, forty gigabytes of
//! access logs. Someone needs the 12 rows where `status = '500'`. Downloading the whole
//! thing would take all night. Instead we send one SQL string and let the bucket sift.
//!
//! This module wraps `SelectObjectContent` and exposes a
//! [`QueryService`](crate::backends::QueryService) whose streams are fed by a background
//! pump reading the SDK's event receiver.
//!
//! 🧠 Knowledge graph:
//! - `build_client`: region, optional custom endpoint (path-style), optional static creds,
//!   SDK retries OFF so our own retry count is the only one that matters
//! - `S3SelectService`: `select_object_content().send()` → spawn pump → `EventStream`
//! - Pump: `payload.recv()` → `SelectEvent` → channel. Transport errors get recorded, not sent.
//!
//! 🦆 The duck has no clearance for AWS. It watches from the edge of the VPC.

mod s3_select_service;

pub use s3_select_service::{S3SelectService, build_client};

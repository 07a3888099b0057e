use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::backends::EventStream;
use crate::request::SelectRequest;
use crate::retry::{attempts_for, retry};

/// 🔍 Something that takes a [`SelectRequest`] and hands back a live [`EventStream`].
///
/// # Contract 📜
/// - One call = one attempt = (at most) one request on the wire.
/// - `Ok(stream)` means the service accepted the query and events are on their way.
/// - `Err(...)` means the submission failed. Retrying is the caller's business.
///
/// # Knowledge Graph 🧠
/// - Pattern: trait → [`S3SelectService`](crate::backends::S3SelectService) for the real thing,
///   hand-rolled fakes in tests
/// - The stream it returns is owned by whoever drains it. Nobody else touches it.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// 📡 Submit the query once.
    async fn select(&self, request: &SelectRequest) -> Result<EventStream>;
}

/// 🚀 Submit with bounded retry: `retries` extra attempts after the first, no delay between.
pub async fn submit<S>(service: &S, request: &SelectRequest, retries: u32) -> Result<EventStream>
where
    S: QueryService + ?Sized,
{
    debug!(
        "📡 submitting query against {} ({:?}, {:?}), up to {} attempt(s)",
        request.uri(),
        request.format,
        request.compression,
        attempts_for(retries)
    );
    retry(retries, |attempt| {
        debug!("📡 submission attempt {}", attempt.saturating_add(1));
        service.select(request)
    })
    .await
    .with_context(|| {
        format!(
            "💀 Query against {} failed after {} attempt(s). The bucket ghosted us. \
             Check: bucket name, key path, region, credentials, and the SQL itself.",
            request.uri(),
            attempts_for(retries)
        )
    })
}

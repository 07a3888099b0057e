//! 🪣 s3s: SELECT things FROM a bucket, print them to stdout, go home.
//!
//! 🧠 Knowledge graph:
//! - [`app_config`] loads flags + env + optional TOML into an [`AppConfig`]
//! - [`request`] turns that into one immutable [`SelectRequest`] (format/compression inferred once)
//! - [`backends`] submits it ([`backends::submit`], bounded retry) and yields an [`EventStream`]
//! - [`consumer`] drains the stream into stdout until End or cancellation

pub mod app_config;
pub mod backends;
pub mod consumer;
pub mod events;
pub mod inference;
pub mod request;
pub mod retry;

use anyhow::Result;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use app_config::{AppConfig, ConfigOverrides, load_config};
pub use backends::{EventStream, LineSink, QueryService, S3SelectService};
pub use consumer::EventConsumer;
pub use request::SelectRequest;

/// 🚀 The whole show against real S3: build the request, build the client, submit, drain
/// into stdout. Returns when End arrives, `cancel` fires, or something breaks.
pub async fn run(app_config: AppConfig, cancel: CancellationToken) -> Result<()> {
    debug!("🔧 running with {:?}", app_config);
    let the_request = SelectRequest::from_config(&app_config);
    let the_service = S3SelectService::new(backends::build_client(&app_config).await);
    let mut the_consumer = EventConsumer::new(LineSink::stdout());

    execute(
        &the_service,
        &the_request,
        app_config.retry,
        &mut the_consumer,
        &cancel,
    )
    .await
}

/// 🎯 Submit `request` through any [`QueryService`] and drain the result into `consumer`.
pub async fn execute<S, W>(
    service: &S,
    request: &SelectRequest,
    retries: u32,
    consumer: &mut EventConsumer<W>,
    cancel: &CancellationToken,
) -> Result<()>
where
    S: QueryService + ?Sized,
    W: AsyncWrite + Unpin,
{
    let the_stream = backends::submit(service, request, retries).await?;
    consumer.drain(the_stream, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{FlakyService, the_request};
    use crate::events::SelectEvent;

    fn the_happy_events() -> Vec<SelectEvent> {
        vec![
            SelectEvent::Continuation,
            SelectEvent::Records(b"{\"a\":1}\n".to_vec()),
            SelectEvent::Records(b"{\"b\":2}\n".to_vec()),
            SelectEvent::Stats(Default::default()),
            SelectEvent::End,
        ]
    }

    #[tokio::test]
    async fn the_one_where_a_flaky_service_still_delivers_the_goods() {
        let the_service = FlakyService::new(2, the_happy_events());
        let mut the_consumer = EventConsumer::new(LineSink::new(Vec::new()));

        execute(
            &the_service,
            &the_request(),
            2,
            &mut the_consumer,
            &CancellationToken::new(),
        )
        .await
        .expect("third time's the charm");

        assert_eq!(the_service.calls(), 3);
        let the_output =
            String::from_utf8(the_consumer.into_sink().into_inner()).expect("utf8 output");
        assert_eq!(the_output, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[tokio::test]
    async fn the_one_where_exhausted_retries_print_nothing() {
        let the_service = FlakyService::new(1, the_happy_events());
        let mut the_consumer = EventConsumer::new(LineSink::new(Vec::new()));

        let the_result = execute(
            &the_service,
            &the_request(),
            0,
            &mut the_consumer,
            &CancellationToken::new(),
        )
        .await;

        assert!(the_result.is_err());
        assert_eq!(the_service.calls(), 1);
        assert!(the_consumer.into_sink().into_inner().is_empty());
    }
}

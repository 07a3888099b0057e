use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::select_object_content::SelectObjectContentOutput;
use aws_sdk_s3::types::ExpressionType;
use tracing::{debug, trace};

use crate::app_config::AppConfig;
use crate::backends::event_stream::DEFAULT_STREAM_CAPACITY;
use crate::backends::{EventStream, EventStreamWriter, QueryService};
use crate::events::SelectEvent;
use crate::request::SelectRequest;

// 🏷️ shows up in SDK debug logs when our static credentials are in play
const STATIC_CREDENTIALS_PROVIDER: &str = "s3s-endpoint-static";

/// 🔧 Build the S3 client: region, optional custom endpoint, optional static credentials.
///
/// aws-config's default chain checks env vars → ~/.aws/config → IAM role → hope.
/// A custom endpoint switches to path-style addressing (`http://host/bucket/key`) because
/// minio and friends rarely do virtual-hosted buckets. If an access key came along with the
/// endpoint, it replaces the default credential chain entirely.
pub async fn build_client(config: &AppConfig) -> aws_sdk_s3::Client {
    let mut the_loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        // -- 🔄 one retry loop is plenty. Ours. See `crate::retry`.
        .retry_config(RetryConfig::disabled());

    if let Some(endpoint) = config.custom_endpoint() {
        debug!("🌐 using custom endpoint {}", endpoint);
        the_loader = the_loader.endpoint_url(endpoint);

        if let Some((access_key, secret)) = config.static_credentials() {
            debug!("🔑 using static credentials for the custom endpoint");
            the_loader = the_loader.credentials_provider(Credentials::new(
                access_key,
                secret,
                None,
                None,
                STATIC_CREDENTIALS_PROVIDER,
            ));
        }
    }

    let the_sdk_config = the_loader.load().await;
    let the_s3_config = aws_sdk_s3::config::Builder::from(&the_sdk_config)
        .force_path_style(config.custom_endpoint().is_some())
        .build();

    aws_sdk_s3::Client::from_conf(the_s3_config)
}

/// 🪣 The real query service. One `SelectObjectContent` call per [`QueryService::select`].
#[derive(Debug, Clone)]
pub struct S3SelectService {
    client: aws_sdk_s3::Client,
    stream_capacity: usize,
}

impl S3SelectService {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self {
            client,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

#[async_trait]
impl QueryService for S3SelectService {
    async fn select(&self, request: &SelectRequest) -> Result<EventStream> {
        let the_output = self
            .client
            .select_object_content()
            .bucket(&request.bucket)
            .key(&request.key)
            .expression(&request.expression)
            .expression_type(ExpressionType::Sql)
            .input_serialization(request.input_serialization())
            .output_serialization(request.output_serialization())
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "💀 SelectObjectContent on {} was refused: {}",
                    request.uri(),
                    DisplayErrorContext(&e)
                )
            })?;

        debug!("🚰 {} accepted the query, opening event stream", request.uri());
        let (the_writer, the_stream) = EventStream::channel(self.stream_capacity);
        let the_pump = tokio::spawn(pump_events(the_output, the_writer));
        Ok(the_stream.attach_pump(the_pump))
    }
}

/// 🚰 Move events from the SDK receiver into our channel until End-of-wire, a transport
/// error, or the reader hanging up. Errors are recorded for the reader, never sent as events.
async fn pump_events(mut output: SelectObjectContentOutput, writer: EventStreamWriter) {
    loop {
        match output.payload.recv().await {
            Ok(Some(event)) => {
                if writer.send(SelectEvent::from(event)).await.is_err() {
                    trace!("🔌 reader hung up, pump stopping");
                    return;
                }
            }
            Ok(None) => {
                trace!("🏁 SDK event receiver exhausted");
                return;
            }
            Err(err) => {
                writer
                    .record_error(anyhow!(
                        "💀 The event stream broke mid-flight: {}",
                        DisplayErrorContext(&err)
                    ))
                    .await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{LineSink, submit};
    use crate::consumer::EventConsumer;
    use aws_smithy_eventstream::frame::write_message_to;
    use aws_smithy_types::event_stream::{Header, HeaderValue, Message};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// 📨 One S3 Select event frame, headers and all.
    fn the_event(
        event_type: &'static str,
        content_type: Option<&'static str>,
        payload: &'static [u8],
    ) -> Message {
        let the_message = Message::new(payload)
            .add_header(Header::new(":message-type", HeaderValue::String("event".into())))
            .add_header(Header::new(":event-type", HeaderValue::String(event_type.into())));
        match content_type {
            Some(content_type) => the_message.add_header(Header::new(
                ":content-type",
                HeaderValue::String(content_type.into()),
            )),
            None => the_message,
        }
    }

    fn the_records(payload: &'static [u8]) -> Message {
        the_event("Records", Some("application/octet-stream"), payload)
    }

    fn the_stats() -> Message {
        the_event(
            "Stats",
            Some("text/xml"),
            b"<Stats><BytesScanned>64</BytesScanned><BytesProcessed>64</BytesProcessed>\
              <BytesReturned>16</BytesReturned></Stats>",
        )
    }

    fn the_end() -> Message {
        the_event("End", None, b"")
    }

    /// 🧵 Frames back to back, the way they come off the wire.
    fn the_wire(messages: &[Message]) -> Vec<u8> {
        let mut the_bytes = Vec::new();
        for message in messages {
            write_message_to(message, &mut the_bytes).expect("test frames encode");
        }
        the_bytes
    }

    /// 🪣 A fake S3 that answers SelectObjectContent with `body`.
    async fn the_server_answering_with(body: Vec<u8>) -> MockServer {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bucket/data.csv.gz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/vnd.amazon.eventstream")
                    .set_body_bytes(body),
            )
            .expect(1)
            .mount(&the_server)
            .await;
        the_server
    }

    fn the_config_pointing_at(endpoint: String, retry: u32) -> AppConfig {
        AppConfig {
            bucket: "bucket".into(),
            key: "data.csv.gz".into(),
            sql: "SELECT * FROM S3Object".into(),
            format: "auto".into(),
            compression: "auto".into(),
            region: "us-east-1".into(),
            retry,
            endpoint: Some(endpoint),
            endpoint_access_key: Some("minio-access".into()),
            endpoint_secret: Some("minio-secret".into()),
        }
    }

    #[tokio::test]
    async fn the_one_where_a_broken_endpoint_gets_exactly_retry_plus_one_calls() {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bucket/data.csv.gz"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&the_server)
            .await;

        let the_config = the_config_pointing_at(the_server.uri(), 2);
        let the_service = S3SelectService::new(build_client(&the_config).await);
        let the_request = SelectRequest::from_config(&the_config);

        let the_result = submit(&the_service, &the_request, the_config.retry).await;
        let the_chain = format!("{:#}", the_result.expect_err("every attempt gets a 500"));
        assert!(the_chain.contains("after 3 attempt(s)"), "got: {the_chain}");

        // -- 🔑 the static access key signed every request
        let the_requests = the_server
            .received_requests()
            .await
            .expect("request recording is on by default");
        assert_eq!(the_requests.len(), 3);
        for the_request in the_requests {
            let the_auth = the_request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            assert!(the_auth.contains("Credential=minio-access/"), "got: {the_auth}");
        }
    }

    #[tokio::test]
    async fn the_one_where_zero_retries_knocks_once() {
        let the_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&the_server)
            .await;

        let the_config = the_config_pointing_at(the_server.uri(), 0);
        let the_service = S3SelectService::new(build_client(&the_config).await);
        let the_result =
            submit(&the_service, &SelectRequest::from_config(&the_config), 0).await;
        assert!(the_result.is_err());
    }

    #[tokio::test]
    async fn the_one_where_real_frames_come_out_as_lines() {
        let the_server = the_server_answering_with(the_wire(&[
            the_records(b"{\"a\":1}\n"),
            the_records(b"{\"b\":2}\n"),
            the_stats(),
            the_end(),
        ]))
        .await;

        let the_config = the_config_pointing_at(the_server.uri(), 0);
        let the_service = S3SelectService::new(build_client(&the_config).await);
        let mut the_consumer = EventConsumer::new(LineSink::new(Vec::new()));

        crate::execute(
            &the_service,
            &SelectRequest::from_config(&the_config),
            0,
            &mut the_consumer,
            &CancellationToken::new(),
        )
        .await
        .expect("records, stats, end: a perfectly boring query");

        let the_output =
            String::from_utf8(the_consumer.into_sink().into_inner()).expect("utf8 output");
        assert_eq!(the_output, "{\"a\":1}\n{\"b\":2}\n");
    }

    #[tokio::test]
    async fn the_one_where_the_wire_snaps_mid_frame() {
        let mut the_body = the_wire(&[the_records(b"{\"a\":1}\n"), the_end()]);
        // -- ✂️ lop the tail off the End frame
        the_body.truncate(the_body.len() - 5);
        let the_server = the_server_answering_with(the_body).await;

        let the_config = the_config_pointing_at(the_server.uri(), 0);
        let the_service = S3SelectService::new(build_client(&the_config).await);
        let the_stream = the_service
            .select(&SelectRequest::from_config(&the_config))
            .await
            .expect("the request itself succeeds");

        let mut the_consumer = EventConsumer::new(LineSink::new(Vec::new()));
        let the_error = the_consumer
            .drain(the_stream, &CancellationToken::new())
            .await
            .expect_err("a half frame is a transport error");
        let the_chain = format!("{:#}", the_error);
        assert!(the_chain.contains("broke mid-flight"), "got: {the_chain}");

        // -- 📜 what made it through before the snap stays printed
        let the_output =
            String::from_utf8(the_consumer.into_sink().into_inner()).expect("utf8 output");
        assert_eq!(the_output, "{\"a\":1}\n");
    }
}

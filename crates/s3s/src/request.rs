//! 📝 The Request Builder: one immutable description of the query we're about to send.
//!
//! 🧠 Knowledge graph:
//! - [`SelectRequest::from_config`] resolves `format`/`compression` (see [`crate::inference`])
//!   exactly once. After that nothing about the request changes.
//! - [`SelectRequest::input_serialization`] / [`SelectRequest::output_serialization`] speak the
//!   SDK's dialect. Output is always JSON, because JSON lines are what we print.

use aws_sdk_s3::types::{
    CompressionType, CsvInput, FileHeaderInfo, InputSerialization, JsonInput, JsonOutput,
    JsonType, OutputSerialization, ParquetInput,
};

use crate::app_config::AppConfig;
use crate::inference::{self, Compression, InputFormat};

/// 📝 Everything the query service needs to know, and nothing it doesn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRequest {
    pub bucket: String,
    pub key: String,
    pub expression: String,
    pub format: InputFormat,
    pub compression: Compression,
}

impl SelectRequest {
    /// 🏗️ Build the request from resolved config. Inference runs here and only here.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bucket: config.bucket.clone(),
            key: config.key.clone(),
            expression: config.sql.clone(),
            format: inference::resolve_format(&config.format, &config.key),
            compression: inference::resolve_compression(&config.compression, &config.key),
        }
    }

    /// 📥 How the object is stored: format + compression, in SDK terms.
    pub fn input_serialization(&self) -> InputSerialization {
        let the_builder =
            InputSerialization::builder().compression_type(match self.compression {
                Compression::None => CompressionType::None,
                Compression::Gzip => CompressionType::Gzip,
                Compression::Bzip2 => CompressionType::Bzip2,
            });

        let the_builder = match self.format {
            // -- 📊 first row is the header. Columns get names, queries get `s.name`.
            InputFormat::Csv => the_builder.csv(
                CsvInput::builder()
                    .file_header_info(FileHeaderInfo::Use)
                    .build(),
            ),
            InputFormat::JsonLines => {
                the_builder.json(JsonInput::builder().r#type(JsonType::Lines).build())
            }
            InputFormat::Parquet => the_builder.parquet(ParquetInput::builder().build()),
        };
        the_builder.build()
    }

    /// 📤 How results come back: always JSON.
    pub fn output_serialization(&self) -> OutputSerialization {
        OutputSerialization::builder()
            .json(JsonOutput::builder().build())
            .build()
    }

    /// 🏷️ `s3://bucket/key`, for log lines and error messages.
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppConfig;

    fn the_config(key: &str, format: &str, compression: &str) -> AppConfig {
        AppConfig {
            bucket: "bucket".into(),
            key: key.into(),
            sql: "SELECT * FROM S3Object s WHERE s.level = 'error'".into(),
            format: format.into(),
            compression: compression.into(),
            region: "us-east-1".into(),
            retry: 0,
            endpoint: None,
            endpoint_access_key: None,
            endpoint_secret: None,
        }
    }

    #[test]
    fn the_one_where_a_gzipped_csv_becomes_a_gzipped_csv_request() {
        let the_request = SelectRequest::from_config(&the_config("logs/a.csv.gz", "auto", "auto"));
        assert_eq!(the_request.format, InputFormat::Csv);
        assert_eq!(the_request.compression, Compression::Gzip);
        assert_eq!(the_request.expression, "SELECT * FROM S3Object s WHERE s.level = 'error'");
        assert_eq!(the_request.uri(), "s3://bucket/logs/a.csv.gz");

        let the_input = the_request.input_serialization();
        assert_eq!(the_input.compression_type(), Some(&CompressionType::Gzip));
        assert_eq!(
            the_input.csv().and_then(|c| c.file_header_info()),
            Some(&FileHeaderInfo::Use)
        );
        assert!(the_input.json().is_none());
        assert!(the_input.parquet().is_none());
    }

    #[test]
    fn the_one_where_json_lines_ask_for_lines() {
        let the_request = SelectRequest::from_config(&the_config("events.json", "auto", "auto"));
        let the_input = the_request.input_serialization();
        assert_eq!(the_input.compression_type(), Some(&CompressionType::None));
        assert_eq!(the_input.json().and_then(|j| j.r#type()), Some(&JsonType::Lines));
    }

    #[test]
    fn the_one_where_explicit_parquet_wins_over_a_lying_extension() {
        let the_request =
            SelectRequest::from_config(&the_config("misnamed.csv.bz2", "parquet", "none"));
        assert_eq!(the_request.format, InputFormat::Parquet);
        assert_eq!(the_request.compression, Compression::None);
        let the_input = the_request.input_serialization();
        assert!(the_input.parquet().is_some());
        assert_eq!(the_input.compression_type(), Some(&CompressionType::None));
    }

    #[test]
    fn the_one_where_output_is_always_json() {
        let the_request = SelectRequest::from_config(&the_config("a.csv", "csv", "auto"));
        let the_output = the_request.output_serialization();
        assert!(the_output.json().is_some());
        assert!(the_output.csv().is_none());
    }
}

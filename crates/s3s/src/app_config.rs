//! 🔧 App Configuration: the sacred flags-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually stitching together flags, env vars and a TOML
//! file is a form of self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph (later layers win):
//! 1. serde defaults on [`AppConfig`] (`sql`, `format`, `compression`, `region`, `retry`)
//! 2. optional TOML file (`--config` / `S3S_CONFIG`)
//! 3. `S3S_*` env vars under their historical names (`S3S_OBJECT_KEY` → `key`), with
//!    `AWS_DEFAULT_REGION` and then `AWS_REGION` feeding `region`. Text stays text.
//! 4. whatever flags were actually typed ([`ConfigOverrides`])

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Value},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
///
/// `bucket` and `key` have no defaults. Forget one and extraction fails before we
/// ever talk to AWS.
#[derive(Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// 🪣 the bucket holding the object
    pub bucket: String,
    /// 🗝️ the key (path and filename) of the object
    pub key: String,
    /// 🔍 the query to run
    #[serde(default = "default_sql")]
    pub sql: String,
    /// 📄 `auto|csv|json|parquet`
    #[serde(default = "default_auto")]
    pub format: String,
    /// 🗜️ `auto|none|gzip|bzip2`
    #[serde(default = "default_auto")]
    pub compression: String,
    /// 🌎 the AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// 🔄 extra submission attempts after the first one fails
    #[serde(default)]
    pub retry: u32,
    /// 🌐 custom endpoint for S3-compatible services (minio and friends)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 🔑 static access key for the custom endpoint
    #[serde(default)]
    pub endpoint_access_key: Option<String>,
    /// 🤫 static secret for the custom endpoint
    #[serde(default)]
    pub endpoint_secret: Option<String>,
}

// 🐛 Debug impl redacts the secret. Logs are forever. Secrets should not be.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("sql", &self.sql)
            .field("format", &self.format)
            .field("compression", &self.compression)
            .field("region", &self.region)
            .field("retry", &self.retry)
            .field("endpoint", &self.endpoint)
            .field("endpoint_access_key", &self.endpoint_access_key)
            .field(
                "endpoint_secret",
                &self.endpoint_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl AppConfig {
    /// 🌐 The custom endpoint, if one was given and it isn't just an empty string
    /// that some shell script exported out of spite.
    pub fn custom_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.is_empty())
    }

    /// 🔑 Static credentials for the custom endpoint: `(access_key, secret)`.
    ///
    /// Only meaningful alongside a custom endpoint. A missing secret becomes an empty
    /// one; whether the endpoint accepts that is between you and the endpoint.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        self.custom_endpoint()?;
        let the_access_key = self.endpoint_access_key.as_deref().filter(|k| !k.is_empty())?;
        Some((the_access_key, self.endpoint_secret.as_deref().unwrap_or("")))
    }
}

// 🔍 the query that says "give me everything", the all-you-can-eat buffet of SQL
fn default_sql() -> String {
    "SELECT * FROM S3Object".to_string()
}

fn default_auto() -> String {
    crate::inference::AUTO.to_string()
}

/// 🌎 Default region: us-east-1. The Florida of AWS regions. Everyone ends up there eventually.
fn default_region() -> String {
    "us-east-1".to_string()
}

/// 🚩 The flags the user actually typed. Unset flags stay `None` and are skipped during
/// serialization, so they don't stomp on env vars or the config file with nothing.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_secret: Option<String>,
}

/// 🏷️ Env vars holding text settings, and the field each one feeds. Later entries win,
/// which is how `AWS_REGION` outranks `AWS_DEFAULT_REGION` outranks `S3S_AWS_REGION`.
const STRING_ENV_VARS: &[(&str, &str)] = &[
    ("S3S_BUCKET", "bucket"),
    ("S3S_OBJECT_KEY", "key"),
    ("S3S_QUERY", "sql"),
    ("S3S_FORMAT", "format"),
    ("S3S_COMPRESSION", "compression"),
    ("S3S_ENDPOINT", "endpoint"),
    ("S3S_ENDPOINT_ACCESS_KEY", "endpoint_access_key"),
    ("S3S_ENDPOINT_SECRET", "endpoint_secret"),
    ("S3S_AWS_REGION", "region"),
    ("AWS_DEFAULT_REGION", "region"),
    ("AWS_REGION", "region"),
];

/// 🧵 The text settings, taken from the environment verbatim.
///
/// figment's `Env` provider parses values as literals, so a bucket named `12345` becomes a
/// number and a secret like `[abc]` becomes an array. These are strings. They stay strings.
/// Unset and empty vars are skipped.
fn string_env() -> Serialized<Dict> {
    let mut the_values = Dict::new();
    for (var, field) in STRING_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                the_values.insert((*field).to_string(), Value::from(value));
            }
        }
    }
    Serialized::defaults(the_values)
}

/// 🔢 `S3S_RETRY_COUNT` is the one number in the bunch, so figment gets to parse it.
fn retry_env() -> Env {
    Env::raw().only(&["S3S_RETRY_COUNT"]).map(|_| "retry".into())
}

/// 🚀 Load the config: file (optional), then env vars, then flags. Last one wins.
///
/// 💀 Returns an error if the named file doesn't exist, if something is unparseable,
/// or if `bucket` / `key` are nowhere to be found.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    debug!(
        "🔧 Loading configuration (file: {:?}, flags: {:?})",
        config_file_name, overrides
    );

    let mut config = Figment::new();

    // 🎯 Figment quietly skips missing files. We don't. A typo'd path should hurt now, not later.
    if let Some(file_name) = config_file_name {
        if !file_name.exists() {
            bail!(
                "💀 Configuration file '{}' does not exist. We checked. Twice. \
                 If it's a relative path, it's relative to wherever you ran this from.",
                file_name.display()
            );
        }
        config = config.merge(Toml::file(file_name));
    }

    let config = config
        .merge(string_env())
        .merge(retry_env())
        .merge(Serialized::defaults(overrides));

    // 💬 a context message that actually TELLS you what went wrong
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to build configuration from flags, environment variables (S3S_*) \
             and the file '{}'. Did you pass --bucket and --key?",
            path.display()
        ),
        None => "💀 Failed to build configuration from flags and environment variables (S3S_*). \
                 Did you pass --bucket and --key?"
            .to_string(),
    };

    config.extract().context(context_msg)
}

//! 🚀 s3s-cli: the front door, the bouncer, the maitre d' of s3s.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that parses flags, sets up logging,
//! listens for a closed pipe, and then lets the library do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use s3s::ConfigOverrides;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Run an S3 Select query against one object and stream the matching records to stdout.
///
/// Every flag can also come from the environment (S3S_BUCKET, S3S_OBJECT_KEY, S3S_QUERY,
/// S3S_FORMAT, S3S_COMPRESSION, AWS_REGION, S3S_RETRY_COUNT, S3S_ENDPOINT, ...) or a TOML
/// file passed with --config.
#[derive(Parser, Debug)]
#[command(name = "s3s", version)]
struct Args {
    /// the bucket with the object
    #[arg(short, long)]
    bucket: Option<String>,

    /// the key (path and filename) of the object
    #[arg(short, long)]
    key: Option<String>,

    /// the query to run [default: SELECT * FROM S3Object]
    #[arg(long)]
    sql: Option<String>,

    /// the format used in object [auto|csv|json|parquet] [default: auto]
    #[arg(short, long)]
    format: Option<String>,

    /// the compression used in object [auto|none|gzip|bzip2] [default: auto]
    #[arg(short, long)]
    compression: Option<String>,

    /// the aws region [default: us-east-1]
    #[arg(short, long)]
    region: Option<String>,

    /// how many times to retry on failure [default: 0]
    #[arg(long)]
    retry: Option<u32>,

    /// the endpoint for the s3 service
    #[arg(long)]
    endpoint: Option<String>,

    /// the endpoint access_key for the s3 service
    #[arg(long)]
    endpoint_access_key: Option<String>,

    /// the endpoint secret for the s3 service
    #[arg(long)]
    endpoint_secret: Option<String>,

    /// optional TOML file with any of the settings above
    #[arg(long, env = "S3S_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    /// 🚩 Only the flags that were actually typed. The rest come from env, file, or defaults.
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            sql: self.sql.clone(),
            format: self.format.clone(),
            compression: self.compression.clone(),
            region: self.region.clone(),
            retry: self.retry,
            endpoint: self.endpoint.clone(),
            endpoint_access_key: self.endpoint_access_key.clone(),
            endpoint_secret: self.endpoint_secret.clone(),
        }
    }
}

/// 🔌 A token that fires when whoever reads our stdout hangs up (SIGPIPE).
#[cfg(unix)]
fn create_cancellation_token() -> Result<CancellationToken> {
    use tokio::signal::unix::{SignalKind, signal};

    let token = CancellationToken::new();
    let copy = token.clone();
    let mut sigpipe = signal(SignalKind::pipe()).context("💀 Couldn't subscribe to SIGPIPE")?;
    tokio::spawn(async move {
        if sigpipe.recv().await.is_some() {
            copy.cancel();
        }
    });
    Ok(token)
}

// 🪟 no SIGPIPE here. A broken stdout still shows up as a write error, which cancels too.
#[cfg(not(unix))]
fn create_cancellation_token() -> Result<CancellationToken> {
    Ok(CancellationToken::new())
}

/// 🚀 main(): where it all begins. The "I pressed enter and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing on stderr (stdout belongs to the records)
/// 2. Parse flags
/// 3. Load config (the moment of truth)
/// 4. Run the thing
/// 5. Handle errors (cry, then exit 1)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 stderr only. One stray log line on stdout and somebody's `jq` pipeline explodes.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let app_config = s3s::load_config(args.config.as_deref(), args.overrides())
        .context("💀 In s3s-cli, main, we couldn't load the configuration. Check the flags, the S3S_* environment, and the config file if you passed one")?;

    let cancel = create_cancellation_token()?;

    // 🚀 SEND IT.
    let result = s3s::run(app_config, cancel).await;

    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("dispatch failure")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }
        if err.to_string().contains("dispatch failure") {
            the_vibes_are_giving_connection_issues = true;
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like S3 isn't reachable. Double-check the region, \
                the --endpoint if you set one, and that your network can reach it. \
                If it's a local minio, `docker ps` is your friend."
            );
        }

        // 🗑️ Exit with prejudice.
        std::process::exit(1);
    }

    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_short_flags_match_the_long_ones() {
        let the_args = Args::try_parse_from([
            "s3s", "-b", "bkt", "-k", "a/b.csv.gz", "-f", "csv", "-c", "gzip", "-r", "eu-west-1",
            "--retry", "2",
        ])
        .expect("valid flags");
        let the_overrides = the_args.overrides();
        assert_eq!(the_overrides.bucket.as_deref(), Some("bkt"));
        assert_eq!(the_overrides.key.as_deref(), Some("a/b.csv.gz"));
        assert_eq!(the_overrides.format.as_deref(), Some("csv"));
        assert_eq!(the_overrides.compression.as_deref(), Some("gzip"));
        assert_eq!(the_overrides.region.as_deref(), Some("eu-west-1"));
        assert_eq!(the_overrides.retry, Some(2));
        assert!(the_overrides.sql.is_none());
    }

    #[test]
    fn the_one_where_untyped_flags_stay_out_of_the_way() {
        let the_args = Args::try_parse_from(["s3s"]).expect("everything is optional at parse time");
        let the_overrides = the_args.overrides();
        assert!(the_overrides.bucket.is_none());
        assert!(the_overrides.retry.is_none());
        assert!(the_overrides.endpoint.is_none());
    }

    #[test]
    fn the_one_where_endpoint_flags_use_kebab_case() {
        let the_args = Args::try_parse_from([
            "s3s",
            "--endpoint",
            "http://localhost:9000",
            "--endpoint-access-key",
            "minio",
            "--endpoint-secret",
            "minio123",
        ])
        .expect("valid flags");
        let the_overrides = the_args.overrides();
        assert_eq!(the_overrides.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(the_overrides.endpoint_access_key.as_deref(), Some("minio"));
        assert_eq!(the_overrides.endpoint_secret.as_deref(), Some("minio123"));
    }

    #[test]
    fn the_one_where_clap_agrees_with_itself() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}

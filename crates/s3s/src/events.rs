//! 📨 Events: the six things an S3 Select response can say to us.
//!
//! The SDK hands us `SelectObjectContentEventStream`, a non-exhaustive enum that may grow
//! new members whenever AWS feels creative. We fold it into our own closed [`SelectEvent`]
//! right at the edge, so everything downstream gets exhaustive matching and the compiler
//! gets to be the QA team. 🧪
//!
//! 🦆 The duck reads every Records event. It ignores the rest. Same as us.

use aws_sdk_s3::types::{
    Progress as SdkProgress, SelectObjectContentEventStream, Stats as SdkStats,
};

/// 📊 Byte counters carried by Progress and Stats events. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanDetails {
    pub bytes_scanned: Option<i64>,
    pub bytes_processed: Option<i64>,
    pub bytes_returned: Option<i64>,
}

impl From<&SdkProgress> for ScanDetails {
    fn from(p: &SdkProgress) -> Self {
        Self {
            bytes_scanned: p.bytes_scanned(),
            bytes_processed: p.bytes_processed(),
            bytes_returned: p.bytes_returned(),
        }
    }
}

impl From<&SdkStats> for ScanDetails {
    fn from(s: &SdkStats) -> Self {
        Self {
            bytes_scanned: s.bytes_scanned(),
            bytes_processed: s.bytes_processed(),
            bytes_returned: s.bytes_returned(),
        }
    }
}

/// 📨 One event off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectEvent {
    /// 💓 keep-alive. "still here, still scanning"
    Continuation,
    /// 📈 periodic progress report
    Progress(ScanDetails),
    /// 📊 final tally, sent just before End
    Stats(ScanDetails),
    /// 📦 actual data. One or more newline-terminated JSON records.
    Records(Vec<u8>),
    /// 🏁 the query is done
    End,
    /// 👽 something the SDK didn't recognise; the tag is whatever it could tell us
    Unknown(String),
}

impl From<SelectObjectContentEventStream> for SelectEvent {
    fn from(event: SelectObjectContentEventStream) -> Self {
        match event {
            SelectObjectContentEventStream::Cont(_) => SelectEvent::Continuation,
            SelectObjectContentEventStream::Progress(progress) => SelectEvent::Progress(
                progress.details().map(ScanDetails::from).unwrap_or_default(),
            ),
            SelectObjectContentEventStream::Stats(stats) => SelectEvent::Stats(
                stats.details().map(ScanDetails::from).unwrap_or_default(),
            ),
            SelectObjectContentEventStream::Records(records) => SelectEvent::Records(
                records
                    .payload()
                    .map(|blob| blob.as_ref().to_vec())
                    .unwrap_or_default(),
            ),
            SelectObjectContentEventStream::End(_) => SelectEvent::End,
            // 👽 `Unknown` and anything AWS adds later
            other => SelectEvent::Unknown(format!("{:?}", other)),
        }
    }
}

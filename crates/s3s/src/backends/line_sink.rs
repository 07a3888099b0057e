use memchr::memchr_iter;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// 🚰 LineSink: writes one record payload per line. I/O only.
///
/// It's a BufWriter around whatever `AsyncWrite` you hand it: stdout in production, a
/// `Vec<u8>` in tests. Each payload is trimmed of newlines on both ends, written, given a
/// single `\n`, and flushed, so records show up downstream as soon as they arrive.
///
/// 🧠 Knowledge graph: the consumer decides WHAT gets written. The sink only knows HOW.
/// Think of it as a very loyal golden retriever. You throw it bytes, it writes them.
#[derive(Debug)]
pub struct LineSink<W: AsyncWrite + Unpin> {
    writer: io::BufWriter<W>,
    lines_written: u64,
    records_written: u64,
    bytes_written: u64,
}

impl LineSink<io::Stdout> {
    /// 📺 The one you actually run with.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: io::BufWriter::new(writer),
            lines_written: 0,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// 📡 Write one payload as one line and flush it.
    pub async fn write_line(&mut self, payload: &[u8]) -> io::Result<()> {
        let the_line = trim_newlines(payload);
        self.writer.write_all(the_line).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        // -- 🔢 a Records payload may hold many records; count them for the closing summary
        let the_records = if the_line.is_empty() {
            0
        } else {
            memchr_iter(b'\n', the_line).count() as u64 + 1
        };
        self.lines_written += 1;
        self.records_written += the_records;
        self.bytes_written += the_line.len() as u64;
        trace!(
            "📬 wrote {} bytes ({} record(s)) to the sink",
            the_line.len(),
            the_records
        );
        Ok(())
    }

    /// 🗑️ Flush whatever is left. Call this. Always.
    pub async fn close(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    /// 📊 `(lines, records, bytes)` written so far.
    pub fn totals(&self) -> (u64, u64, u64) {
        (self.lines_written, self.records_written, self.bytes_written)
    }

    /// 🎁 Hand back the inner writer. Tests use this to read what we printed.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// ✂️ Strip `\n` from both ends. Carriage returns and spaces are the payload's business.
pub fn trim_newlines(payload: &[u8]) -> &[u8] {
    let the_start = payload
        .iter()
        .position(|&b| b != b'\n')
        .unwrap_or(payload.len());
    let the_end = payload
        .iter()
        .rposition(|&b| b != b'\n')
        .map(|i| i + 1)
        .unwrap_or(the_start);
    &payload[the_start..the_end]
}

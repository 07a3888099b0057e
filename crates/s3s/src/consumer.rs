//! 🎬 *[an event stream fills with records. somewhere, a terminal waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for these log lines. and yet, here we are.]*
//!
//! 🗑️ The EventConsumer: patient, tireless, and deeply unbothered by the chaos happening
//! upstream. It receives events. It prints records. It asks no questions.
//!
//! 🧠 Knowledge graph:
//! - States: `Open` (handed a stream) → `Draining` (events arriving) → `Closed` (done)
//! - Each loop turn races two things: the next event, and the cancellation token.
//!   No favourites. `tokio::select!` flips the coin.
//! - `End` closes cleanly. Cancellation closes with whatever error the stream recorded.
//!   A stdout write failing with `BrokenPipe` counts as cancellation: the reader left.
//! - `Records` is the only event that produces output. Everything else is a trace line.
//! - The stream is released on every exit path. It's passed by value and closed before
//!   `drain` returns, no matter how we got there.

use std::io::ErrorKind;

use anyhow::{Context, Result, anyhow};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::backends::{EventStream, LineSink};
use crate::events::SelectEvent;

/// 🚦 Where the consumer is in its short life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Open,
    Draining,
    Closed,
}

/// 🔀 What to do after handling one event.
enum Step {
    Continue,
    Finished,
    ReaderGone,
}

/// 🗑️ Takes events from a stream, throws record payloads into a sink.
#[derive(Debug)]
pub struct EventConsumer<W: AsyncWrite + Unpin> {
    sink: LineSink<W>,
    state: ConsumerState,
    events_seen: u64,
}

impl<W: AsyncWrite + Unpin> EventConsumer<W> {
    /// 🏗️ You hand it a sink. It does not judge. It does not negotiate.
    pub fn new(sink: LineSink<W>) -> Self {
        Self {
            sink,
            state: ConsumerState::Open,
            events_seen: 0,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// 🎁 Give the sink back, mostly so tests can see what got printed.
    pub fn into_sink(self) -> LineSink<W> {
        self.sink
    }

    /// 🚰 Drain `stream` until End, cancellation, or failure. The stream is released before
    /// this returns, on every path.
    pub async fn drain(&mut self, mut stream: EventStream, cancel: &CancellationToken) -> Result<()> {
        self.state = ConsumerState::Open;
        debug!("📥 EventConsumer started draining the event stream...");

        let the_result = self.drain_until_closed(&stream, cancel).await;

        self.state = ConsumerState::Closed;
        stream.close();
        drop(stream);

        let the_flush = self.sink.close().await;

        let (the_lines, the_records, the_bytes) = self.sink.totals();
        debug!(
            "🏁 EventConsumer closed after {} event(s): {} line(s), {} record(s), {} byte(s) written",
            self.events_seen, the_lines, the_records, the_bytes
        );

        // -- 🚽 the drain's own error wins. A reader that already left doesn't get to fail us twice.
        the_result?;
        match the_flush {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                Err(e).context("💀 Failed to flush the last records to stdout")
            }
            _ => Ok(()),
        }
    }

    async fn drain_until_closed(
        &mut self,
        stream: &EventStream,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("🛑 cancellation received, letting go of the event stream");
                    return recorded_outcome(stream).await;
                }
                the_event = stream.recv() => {
                    let Some(the_event) = the_event else {
                        // -- 💀 the writer hung up without saying End
                        return Err(stream.take_error().await.unwrap_or_else(|| {
                            anyhow!("💀 The event stream ended before the End event. \
                                     The query may have been cut short.")
                        }));
                    };
                    match self.handle(the_event).await? {
                        Step::Continue => {}
                        Step::Finished => return Ok(()),
                        Step::ReaderGone => {
                            debug!("🔌 stdout reader is gone, treating it as cancellation");
                            cancel.cancel();
                            return recorded_outcome(stream).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&mut self, event: SelectEvent) -> Result<Step> {
        self.state = ConsumerState::Draining;
        self.events_seen += 1;

        match event {
            SelectEvent::Continuation => trace!("💓 continuation"),
            SelectEvent::Progress(details) => trace!("📈 progress: {:?}", details),
            SelectEvent::Stats(details) => trace!("📊 stats: {:?}", details),
            SelectEvent::Records(payload) => match self.sink.write_line(&payload).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(Step::ReaderGone),
                Err(e) => return Err(e).context("💀 Failed to write a record to stdout"),
            },
            SelectEvent::End => {
                debug!("🏁 End event received");
                return Ok(Step::Finished);
            }
            SelectEvent::Unknown(tag) => warn!("👽 unknown tag: {}", tag),
        }
        Ok(Step::Continue)
    }
}

/// 💀 Cancellation outcome: the stream's recorded error if it has one, success otherwise.
async fn recorded_outcome(stream: &EventStream) -> Result<()> {
    match stream.take_error().await {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

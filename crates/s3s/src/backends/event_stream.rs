//! 🚰 EventStream: the pipe between whoever reads the wire and whoever prints the records.
//!
//! 🧠 Knowledge graph:
//! - [`EventStream`] is the reading end: an `async_channel` receiver plus a shared slot
//!   where the writing end can leave a transport error before it hangs up.
//! - [`EventStreamWriter`] is the writing end: the S3 pump task owns one, tests own others.
//! - Closing the stream closes the channel and aborts the pump task, if one is attached.
//!   `Drop` does the same, so no exit path leaves a reader running.
//!
//! "He who reads the wire and prints the records in the same loop, learns about
//! backpressure in production." (Ancient proverb) 📜

use std::sync::Arc;

use anyhow::Error;
use async_channel::{Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::events::SelectEvent;

/// 📦 How many events can sit in the pipe before the pump waits for the consumer.
pub(crate) const DEFAULT_STREAM_CAPACITY: usize = 64;

type ErrorSlot = Arc<Mutex<Option<Error>>>;

/// 🚰 The reading end of an event stream. Consumed exactly once, in order.
#[derive(Debug)]
pub struct EventStream {
    rx: Receiver<SelectEvent>,
    recorded_error: ErrorSlot,
    pump: Option<JoinHandle<()>>,
}

/// ✍️ The writing end. Send events, then either drop it (clean close) or
/// [`record_error`](EventStreamWriter::record_error) (dirty close).
#[derive(Debug, Clone)]
pub struct EventStreamWriter {
    tx: Sender<SelectEvent>,
    recorded_error: ErrorSlot,
}

impl EventStream {
    /// 🏗️ A fresh pipe with room for `capacity` events in flight.
    pub fn channel(capacity: usize) -> (EventStreamWriter, EventStream) {
        let (tx, rx) = async_channel::bounded(capacity);
        let recorded_error: ErrorSlot = Arc::new(Mutex::new(None));
        (
            EventStreamWriter {
                tx,
                recorded_error: recorded_error.clone(),
            },
            EventStream {
                rx,
                recorded_error,
                pump: None,
            },
        )
    }

    /// 🧪 A stream that already holds `events` and has nobody left writing to it.
    #[cfg(test)]
    pub(crate) fn from_events(events: impl IntoIterator<Item = SelectEvent>) -> EventStream {
        let the_events: Vec<SelectEvent> = events.into_iter().collect();
        let (writer, stream) = EventStream::channel(the_events.len().max(1));
        for event in the_events {
            writer
                .tx
                .try_send(event)
                .expect("capacity matches the event count and the reader is open");
        }
        stream
    }

    /// 🔗 Tie a background reader task to this stream so closing the stream stops it.
    pub(crate) fn attach_pump(mut self, pump: JoinHandle<()>) -> Self {
        self.pump = Some(pump);
        self
    }

    /// 📨 Next event, or `None` once the writer is gone and the pipe is drained.
    pub async fn recv(&self) -> Option<SelectEvent> {
        self.rx.recv().await.ok()
    }

    /// 💀 Take the transport error the writer left behind, if any.
    pub async fn take_error(&self) -> Option<Error> {
        self.recorded_error.lock().await.take()
    }

    /// 🗑️ Release the reader: close the channel and stop the pump. Safe to call twice.
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(pump) = self.pump.take() {
            trace!("🔌 aborting event pump");
            pump.abort();
        }
    }

    /// 🔍 Has the reading end been released?
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed() && self.pump.is_none()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl EventStreamWriter {
    /// 📤 Push one event. Fails only when the reading end has been closed.
    pub async fn send(&self, event: SelectEvent) -> Result<(), SelectEvent> {
        self.tx.send(event).await.map_err(|e| e.into_inner())
    }

    /// 💀 Leave a transport error for the reader and hang up.
    pub async fn record_error(self, error: Error) {
        *self.recorded_error.lock().await = Some(error);
        self.tx.close();
    }

    /// 🔍 Has the reader hung up on us?
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

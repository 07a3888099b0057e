//! 🔄 Retry: "if at first you don't succeed, try exactly `times` more times, then give up."
//!
//! No backoff. No jitter. No exponential anything. A loop and a counter.
//! `times = 0` means one attempt. `times = 2` means up to three.

use std::future::Future;

use anyhow::Result;
use tracing::warn;

/// 🔢 Total attempts for `times` retries. `u32::MAX` retries is a lot, but it doesn't wrap.
pub fn attempts_for(times: u32) -> u32 {
    times.saturating_add(1)
}

/// 🔄 Run `attempt` until it succeeds or `times` extra attempts have failed too.
///
/// `attempt` receives the zero-based attempt number. The last error is returned untouched.
pub async fn retry<T, F, Fut>(times: u32, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tried = 0u32;
    loop {
        match attempt(tried).await {
            Ok(value) => return Ok(value),
            Err(err) if tried >= times => return Err(err),
            Err(err) => {
                warn!(
                    "🔄 attempt {} of {} failed, trying again: {:#}",
                    tried.saturating_add(1),
                    attempts_for(times),
                    err
                );
                tried += 1;
            }
        }
    }
}

//! Bounded retry with an explicit delay schedule.
//!
//! Every resolver that talks to a rate-limited upstream drives its call
//! through [`retry_with_delays`] instead of hand-rolling a sleep loop. The
//! caller classifies each attempt: transient outcomes consume the next delay
//! and reissue, terminal outcomes stop immediately so the budget is not
//! wasted on errors a retry cannot fix.

use log::warn;
use std::future::Future;
use std::time::Duration;

/// Classified result of a single attempt against a flaky upstream.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The upstream answered with usable data.
    Done(T),
    /// Rate limited (or similar); worth another attempt after a pause.
    Transient,
    /// Definitive failure (bad address, no data, wrong chain); retrying
    /// cannot change the outcome.
    Terminal,
}

/// Runs `op` once, then once more per entry in `delays`, sleeping the entry
/// before each reissue. Returns `None` when the attempt was terminal or the
/// schedule is exhausted.
pub async fn retry_with_delays<T, F, Fut>(delays: &[Duration], mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    match op().await {
        Attempt::Done(v) => return Some(v),
        Attempt::Terminal => return None,
        Attempt::Transient => {}
    }

    let attempts = delays.len() + 1;
    for (i, delay) in delays.iter().enumerate() {
        warn!(
            "transient upstream failure, retrying in {:?} (attempt {}/{})",
            delay,
            i + 2,
            attempts
        );
        tokio::time::sleep(*delay).await;
        match op().await {
            Attempt::Done(v) => return Some(v),
            Attempt::Terminal => return None,
            Attempt::Transient => {}
        }
    }

    warn!("retry budget exhausted after {} attempts", attempts);
    None
}

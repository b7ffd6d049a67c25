//! Round-trip timing.
//!
//! Every query against an attached process is a blocking round-trip, and the
//! cost of a summary is dominated by how many of them it issues. `Stopwatch`
//! reports elapsed wall time for a labelled operation at `trace` level so the
//! expensive paths show up in the logs without a profiler.

use std::time::{Duration, Instant};

/// Measures one labelled operation.
///
/// ```rust
/// use heapscope_utils::Stopwatch;
///
/// let watch = Stopwatch::start("classify");
/// // ... talk to the target ...
/// let elapsed = watch.finish();
/// assert!(elapsed.as_secs() < 60);
/// ```
#[derive(Debug)]
pub struct Stopwatch
{
    label: &'static str,
    started: Instant,
}

impl Stopwatch
{
    /// Start timing `label`.
    #[must_use]
    pub fn start(label: &'static str) -> Self
    {
        Self {
            label,
            started: Instant::now(),
        }
    }

    /// Time elapsed so far, without logging.
    #[must_use]
    pub fn elapsed(&self) -> Duration
    {
        self.started.elapsed()
    }

    /// Log the elapsed time and return it.
    pub fn finish(self) -> Duration
    {
        let elapsed = self.started.elapsed();
        tracing::trace!(
            operation = self.label,
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "round-trip timing"
        );
        elapsed
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_stopwatch_is_monotonic()
    {
        let watch = Stopwatch::start("test");
        let first = watch.elapsed();
        let second = watch.finish();
        assert!(second >= first);
    }
}

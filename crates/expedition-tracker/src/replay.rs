//! Replay location source.
//!
//! Plays back a prerecorded list of fixes, optionally paced at the
//! configured sample interval. Used by tests and by the agent's replay
//! mode to re-run a recorded approach.

use tokio::sync::mpsc;

use expedition_types::LocationFix;

use crate::location::{FIX_CHANNEL_CAPACITY, FixStream, LocationError, LocationSource, WatchOptions};

/// A location source that replays a recorded track.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    fixes: Vec<LocationFix>,
    paced: bool,
}

impl ReplaySource {
    /// Create a source replaying the given fixes as fast as the consumer
    /// reads them.
    pub const fn new(fixes: Vec<LocationFix>) -> Self {
        Self { fixes, paced: false }
    }

    /// Pace playback at the watch's sample interval instead of replaying
    /// back-to-back.
    #[must_use]
    pub const fn paced(mut self) -> Self {
        self.paced = true;
        self
    }
}

impl LocationSource for ReplaySource {
    async fn watch(&self, options: WatchOptions) -> Result<FixStream, LocationError> {
        if self.fixes.is_empty() {
            // Nothing to replay; behave like a device with no provider.
            return Err(LocationError::Unavailable);
        }

        let (tx, rx) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        let fixes = self.fixes.clone();
        let paced = self.paced;
        let interval = options.sample_interval;

        tokio::spawn(async move {
            for fix in fixes {
                if tx.send(fix).await.is_err() {
                    // Watch cancelled; the stream was dropped.
                    return;
                }
                if paced {
                    tokio::time::sleep(interval).await;
                }
            }
            // Replay exhausted; the stream closes and the watch ends.
        });

        Ok(rx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_fixes_in_order_then_closes() {
        let fixes = vec![
            LocationFix::new(46.85, -121.76, 3200.0, 10.0),
            LocationFix::new(46.86, -121.77, 3250.0, 8.0),
        ];
        let source = ReplaySource::new(fixes);
        let mut stream = source.watch(WatchOptions::new()).await.unwrap();

        assert_eq!(stream.recv().await.unwrap().lat, 46.85);
        assert_eq!(stream.recv().await.unwrap().lat, 46.86);
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_replay_is_unavailable() {
        let source = ReplaySource::new(Vec::new());
        let err = source.watch(WatchOptions::new()).await.unwrap_err();
        assert_eq!(err, LocationError::Unavailable);
    }
}

// src/jobs/poll_timer.rs
//! Fixed-period status-check timer for one job. Dropping the timer disarms it.

use super::{JobTag, WorkflowEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug)]
pub struct PollTimer {
    tag: JobTag,
    handle: JoinHandle<()>,
}

impl PollTimer {
    /// Start emitting `Tick(tag)` every `period`, first tick one period from now.
    pub fn arm(tag: JobTag, period: Duration, events: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            // Slow polls must not produce a burst of catch-up ticks.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(WorkflowEvent::Tick(tag)).is_err() {
                    break;
                }
            }
        });
        tracing::debug!("⏱️ Poll timer armed for {} every {:?}", tag, period);
        Self { tag, handle }
    }

    pub fn tag(&self) -> JobTag {
        self.tag
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("⏱️ Poll timer disarmed for {}", self.tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_ticks_with_its_tag_until_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tag = JobTag::first().next();
        let timer = PollTimer::arm(tag, Duration::from_millis(5), tx);

        for _ in 0..2 {
            match rx.recv().await {
                Some(WorkflowEvent::Tick(t)) => assert_eq!(t, tag),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        drop(timer);
        // The aborted task drops its sender, so the channel drains and closes.
        let drained = tokio::time::timeout(Duration::from_secs(1), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}

use std::time::Duration;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tokio::time::MissedTickBehavior;

use crate::{Message, Outbound, SessionError};

/// The default time between two chatter lines.
pub const DEFAULT_CHATTER_PERIOD: Duration = Duration::from_millis(3000);

const DEFAULT_LINES: [&str; 6] = [
    "Sim checks the mailbox.",
    "Sim waves at the camera.",
    "Sim checks whether the WiFi is up.",
    "Sim walks to the front door and rings.",
    "Sim waits, nobody opens.",
    "Sim walks back to the hub.",
];

/// Filler log lines sent to the peer at a fixed period, so the client's log panel shows a
/// live session even when no route changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatterOptions {
    period: Duration,
    lines: Vec<String>,
}

impl Default for ChatterOptions {
    fn default() -> Self {
        Self {
            period: DEFAULT_CHATTER_PERIOD,
            lines: DEFAULT_LINES.iter().map(|l| (*l).to_owned()).collect(),
        }
    }
}

impl ChatterOptions {
    /// Sets the time between two lines. Zero is raised to one millisecond.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    /// Replaces the pool lines are picked from. An empty pool sends nothing.
    pub fn lines(mut self, lines: Vec<String>) -> Self {
        self.lines = lines;
        self
    }

    /// Sends a randomly picked line every period until the peer goes away.
    pub(crate) async fn run(self, outbound: Outbound) -> Result<(), SessionError> {
        if self.lines.is_empty() {
            return Ok(());
        }

        let mut rng = StdRng::from_entropy();
        let start = tokio::time::Instant::now() + self.period;
        let mut ticker = tokio::time::interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Some(line) = self.lines.choose(&mut rng) {
                outbound.send(Message::info(line.as_str())).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{channel::mpsc, SinkExt, StreamExt};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sends_one_line_per_period() {
        let (tx, mut rx) = mpsc::unbounded();
        let outbound = Outbound::new(Box::pin(tx.sink_map_err(SessionError::transport)));

        let chatter = ChatterOptions::default()
            .period(Duration::from_millis(1000))
            .lines(vec!["Sim naps.".to_owned()]);
        let task = tokio::spawn(chatter.run(outbound));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2001)).await;
        for _ in 0..3 {
            assert_eq!(rx.next().await, Some(Message::info("Sim naps.")));
        }

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_sends_nothing() {
        let (tx, mut rx) = mpsc::unbounded();
        let outbound = Outbound::new(Box::pin(tx.sink_map_err(SessionError::transport)));

        ChatterOptions::default().lines(vec![]).run(outbound).await.unwrap();

        assert_eq!(rx.next().await, None);
    }
}

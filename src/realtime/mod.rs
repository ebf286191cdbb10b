//! Fan-out of stats updates to connected clients.
//!
//! Delivery is at most once: an update reaches the subscribers connected at
//! the moment it is published, nothing is buffered for later subscribers and
//! nothing is acknowledged. Clients resynchronize by reading a feed view.
//!
//! Every subscriber reads from one bounded ring. A subscriber that falls more
//! than `capacity` updates behind loses the oldest ones instead of queueing
//! them.

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::domain::stats::TrackUpdate;

pub mod socket;

const DEFAULT_CAPACITY: usize = 64;

pub struct Broadcaster {
    sender: broadcast::Sender<TrackUpdate>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new subscriber. Dropping the returned handle unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            missed: 0,
        }
    }

    /// Hands the update to every live subscriber.
    ///
    /// Returns the number of subscribers it reached.
    pub fn publish(&self, update: &TrackUpdate) -> usize {
        let delivered = self.sender.send(update.clone()).unwrap_or(0);
        log::debug!(
            "track:update {} delivered to {delivered} subscribers",
            update.track_id
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// What a subscriber finds when it polls for the next update
#[derive(Debug, PartialEq, Eq)]
pub enum Next {
    Update(TrackUpdate),
    Idle,
    Closed,
}

pub struct Subscription {
    receiver: broadcast::Receiver<TrackUpdate>,
    missed: u64,
}

impl Subscription {
    /// Takes the next pending update without blocking.
    ///
    /// Updates this subscriber fell behind on are skipped and counted in
    /// [`Subscription::missed`].
    pub fn try_next(&mut self) -> Next {
        loop {
            match self.receiver.try_recv() {
                Ok(update) => return Next::Update(update),
                Err(TryRecvError::Empty) => return Next::Idle,
                Err(TryRecvError::Closed) => return Next::Closed,
                Err(TryRecvError::Lagged(skipped)) => {
                    log::debug!("Slow subscriber skipped {skipped} updates");
                    self.missed = self.missed.saturating_add(skipped);
                }
            }
        }
    }

    /// Number of updates dropped because this subscriber lagged
    pub fn missed(&self) -> u64 {
        self.missed
    }

    #[cfg(test)]
    pub(crate) fn pending(&mut self) -> Vec<TrackUpdate> {
        let mut updates = Vec::new();
        while let Next::Update(update) = self.try_next() {
            updates.push(update);
        }
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stats::StatsCounts;

    fn update(track_id: &str, plays: u64) -> TrackUpdate {
        TrackUpdate {
            track_id: track_id.to_string(),
            counts: StatsCounts {
                plays,
                likes: 0,
                saves: 0,
            },
        }
    }

    #[test]
    fn test_every_subscriber_gets_every_update() {
        let broadcaster = Broadcaster::new();
        let a = broadcaster.subscribe();
        let b = broadcaster.subscribe();

        assert_eq!(broadcaster.publish(&update("t1", 1)), 2);
        assert_eq!(broadcaster.publish(&update("t2", 7)), 2);

        for mut rx in [a, b] {
            assert_eq!(rx.pending(), vec![update("t1", 1), update("t2", 7)]);
        }
    }

    #[test]
    fn test_late_subscriber_misses_earlier_updates() {
        let broadcaster = Broadcaster::new();
        let mut early = broadcaster.subscribe();

        broadcaster.publish(&update("t1", 1));
        let mut late = broadcaster.subscribe();
        broadcaster.publish(&update("t1", 2));

        assert_eq!(early.pending().len(), 2);
        assert_eq!(late.pending(), vec![update("t1", 2)]);
    }

    #[test]
    fn test_slow_subscriber_loses_oldest_updates() {
        let broadcaster = Broadcaster::with_capacity(4);
        let mut stalled = broadcaster.subscribe();

        for plays in 1..=10_000 {
            broadcaster.publish(&update("t1", plays));
        }

        let received = stalled.pending();
        assert_eq!(received.len(), 4);
        assert_eq!(
            received.iter().map(|u| u.counts.plays).collect::<Vec<_>>(),
            vec![9_997, 9_998, 9_999, 10_000]
        );
        assert_eq!(stalled.missed(), 9_996);
        assert_eq!(stalled.try_next(), Next::Idle);
    }

    #[test]
    fn test_dropped_subscribers_are_forgotten() {
        let broadcaster = Broadcaster::new();
        let mut kept = broadcaster.subscribe();
        drop(broadcaster.subscribe());

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.publish(&update("t1", 1)), 1);
        assert_eq!(kept.pending().len(), 1);
    }

    #[test]
    fn test_subscription_closes_with_broadcaster() {
        let broadcaster = Broadcaster::new();
        let mut updates = broadcaster.subscribe();
        broadcaster.publish(&update("t1", 1));
        drop(broadcaster);

        assert_eq!(updates.try_next(), Next::Update(update("t1", 1)));
        assert_eq!(updates.try_next(), Next::Closed);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::new();

        assert_eq!(broadcaster.publish(&update("t1", 1)), 0);
    }
}

use tokio::sync::broadcast;

/// Signal name pushed to realtime clients. Zero payload; receivers are
/// expected to re-fetch the post list.
pub const POSTS_UPDATED: &str = "postsUpdated";

/// Process-wide fan-out of change signals to connected realtime clients.
///
/// Connection lifecycle is owned by the channel: a client registers by
/// subscribing and deregisters by dropping its receiver. Handlers get the
/// broadcaster injected through app state. There is no delivery guarantee
/// and no replay for clients that connect after a signal fires.
#[derive(Clone)]
pub struct ChangeBroadcaster {
    tx: broadcast::Sender<&'static str>,
}

impl ChangeBroadcaster {
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<&'static str> {
        self.tx.subscribe()
    }

    /// Tell every connected client that post data changed. A send with no
    /// subscribers is not an error; nobody is listening.
    pub fn posts_updated(&self) {
        let receivers = self.tx.send(POSTS_UPDATED).unwrap_or(0);
        tracing::debug!("broadcast {} to {} clients", POSTS_UPDATED, receivers);
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_signal() {
        let notifier = ChangeBroadcaster::new(4);
        let mut rx = notifier.subscribe();

        notifier.posts_updated();
        assert_eq!(rx.recv().await.unwrap(), POSTS_UPDATED);
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_signal() {
        let notifier = ChangeBroadcaster::new(4);
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();

        notifier.posts_updated();
        notifier.posts_updated();

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap(), POSTS_UPDATED);
            assert_eq!(rx.recv().await.unwrap(), POSTS_UPDATED);
        }
    }

    #[test]
    fn send_without_subscribers_is_fine() {
        let notifier = ChangeBroadcaster::new(4);
        notifier.posts_updated();
        assert_eq!(notifier.client_count(), 0);
    }

    #[test]
    fn client_count_tracks_subscriptions() {
        let notifier = ChangeBroadcaster::new(4);
        let rx = notifier.subscribe();
        assert_eq!(notifier.client_count(), 1);
        drop(rx);
        assert_eq!(notifier.client_count(), 0);
    }
}

use tokio::sync::broadcast;

/// Fan-out channel for events that several observers care about.
///
/// Slow subscribers lag rather than block the publisher; a lagged receiver
/// sees `RecvError::Lagged` and picks up from the oldest retained event.
pub struct EventBus<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E: Clone> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Sample {
        Joined(String),
        Left(String),
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Sample::Joined("alice".into()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, Sample::Joined("alice".into()));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Sample::Left("bob".into()));

        assert_eq!(rx1.recv().await.unwrap(), Sample::Left("bob".into()));
        assert_eq!(rx2.recv().await.unwrap(), Sample::Left("bob".into()));
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Sample::Joined("a".into()));
        bus.publish(Sample::Joined("b".into()));
        bus.publish(Sample::Left("a".into()));

        assert_eq!(rx.recv().await.unwrap(), Sample::Joined("a".into()));
        assert_eq!(rx.recv().await.unwrap(), Sample::Joined("b".into()));
        assert_eq!(rx.recv().await.unwrap(), Sample::Left("a".into()));
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(Sample::Joined("x".into())), 0);
    }

    #[test]
    fn cloned_bus_shares_subscribers() {
        let bus = EventBus::new(16);
        let clone = bus.clone();
        let _rx1 = bus.subscribe();
        let _rx2 = clone.subscribe();

        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(clone.publish(Sample::Left("y".into())), 2);
    }
}

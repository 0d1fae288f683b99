use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::warn;

/// Typed broadcast channel fanning state changes out to any number of observers.
///
/// Delivery order between subscribers is unspecified; a slow subscriber skips what it missed.
pub struct EventHub<T> {
    sender: broadcast::Sender<T>,
}

impl<T> EventHub<T>
where
    T: Clone + Send + 'static,
{
    /// Create a hub buffering up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Raw receiver for subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers; having none is not an error.
    pub fn publish(&self, event: T) {
        let _ = self.sender.send(event);
    }

    /// Run `handler` for every subsequent event until the returned subscription is cancelled.
    pub fn listen<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => handler(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Subscription { task }
    }
}

/// Handle to a running [`EventHub::listen`] callback.
#[must_use = "dropping a subscription leaves the listener running; call `cancel` to stop it"]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering events to the handler.
    pub fn cancel(self) {
        self.task.abort();
    }

    /// Whether the handler still receives events.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn listener_receives_until_cancelled() {
        let hub = EventHub::<u32>::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = hub.listen(move |value| sink.lock().unwrap().push(value));

        hub.publish(1);
        hub.publish(2);
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);

        subscription.cancel();
        settle().await;
        hub.publish(3);
        settle().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let hub = EventHub::<&'static str>::new(1);
        hub.publish("nobody listens");

        let mut rx = hub.subscribe();
        hub.publish("hello");
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }
}

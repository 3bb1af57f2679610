//! Poison-pill termination for [`BoundedQueue`] consumers.
//!
//! A producer that wants one consumer to stop puts a [`Message::Stop`];
//! the consumer that takes it ends its loop. Put one `Stop` per consumer.

use super::BoundedQueue;

/// Envelope separating real data from the stop signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    Item(T),
    Stop,
}

impl<T> Message<T> {
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Stop => None,
        }
    }
}

impl<T> From<T> for Message<T> {
    fn from(item: T) -> Self {
        Self::Item(item)
    }
}

impl<T> BoundedQueue<Message<T>> {
    pub fn put_item(&self, item: T) {
        self.put(Message::Item(item));
    }

    pub fn put_stop(&self) {
        self.put(Message::Stop);
    }

    /// Hands every item to `handler` until a stop arrives, marking each
    /// message done, and returns how many items were handled.
    pub fn consume<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let mut handled = 0;
        loop {
            let message = self.get();
            let stop = match message {
                Message::Item(item) => {
                    handler(item);
                    handled += 1;
                    false
                }
                Message::Stop => true,
            };

            if let Err(err) = self.task_done() {
                tracing::warn!(%err, "consumer could not mark message done");
            }
            if stop {
                tracing::debug!(handled, "consumer received stop");
                return handled;
            }
        }
    }

    /// Async counterpart of [`BoundedQueue::consume`].
    pub async fn consume_async<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let mut handled = 0;
        loop {
            let message = self.get_async().await;
            let stop = message.is_stop();
            if let Some(item) = message.into_item() {
                handler(item);
                handled += 1;
            }

            if let Err(err) = self.task_done() {
                tracing::warn!(%err, "consumer could not mark message done");
            }
            if stop {
                return handled;
            }
        }
    }
}

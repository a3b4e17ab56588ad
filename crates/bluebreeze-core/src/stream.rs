// ── Async channel streams ──
//
// `Stream` adapters for consuming channels from async code instead of
// registering callbacks.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::channel::{EventChannel, StateChannel, Subscription};

/// `Stream` of values published on a channel.
///
/// For a [`StateChannel`] the first item is the value cached when the stream
/// was created (if any). Dropping the stream cancels the subscription.
pub struct ChannelStream<T> {
    inner: UnboundedReceiverStream<T>,
    subscription: Subscription,
}

impl<T: Clone + Send + Sync + 'static> ChannelStream<T> {
    fn attach(register: impl FnOnce(mpsc::UnboundedSender<T>) -> Subscription) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = register(tx);
        Self {
            inner: UnboundedReceiverStream::new(rx),
            subscription,
        }
    }

    /// Stop receiving new values. Items already buffered are still yielded.
    pub fn cancel(&self) {
        self.subscription.cancel();
    }
}

impl<T> Stream for ChannelStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T: Clone + Send + Sync + 'static> StateChannel<T> {
    /// Consume this channel as a [`Stream`], starting with the cached value.
    pub fn stream(&self) -> ChannelStream<T> {
        ChannelStream::attach(|tx| {
            self.subscribe(move |value: &T| {
                let _ = tx.send(value.clone());
            })
        })
    }
}

impl<T: Clone + Send + Sync + 'static> EventChannel<T> {
    /// Consume this channel as a [`Stream`] of future emissions.
    pub fn stream(&self) -> ChannelStream<T> {
        ChannelStream::attach(|tx| {
            self.subscribe(move |value: &T| {
                let _ = tx.send(value.clone());
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;

    #[tokio::test]
    async fn state_stream_starts_with_cached_value() {
        let channel = StateChannel::with_value(1u32);
        let mut stream = channel.stream();

        channel.set(2);
        channel.set(3);

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, Some(3));
    }

    #[tokio::test]
    async fn event_stream_yields_only_later_emissions() {
        let channel = EventChannel::new();
        channel.emit("missed");
        let mut stream = channel.stream();
        channel.emit("seen");

        assert_eq!(stream.next().await, Some("seen"));
    }

    #[test]
    fn empty_state_stream_waits_for_first_value() {
        let channel: StateChannel<u8> = StateChannel::new();
        let mut stream = tokio_test::task::spawn(channel.stream());
        tokio_test::assert_pending!(stream.poll_next());

        channel.set(4);
        assert!(stream.is_woken());
        tokio_test::assert_ready_eq!(stream.poll_next(), Some(4));
    }

    #[tokio::test]
    async fn dropping_stream_unsubscribes() {
        let channel = StateChannel::with_value(0u8);
        let stream = channel.stream();
        assert_eq!(channel.subscriber_count(), 1);

        drop(stream);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_stream_ends_after_buffered_items() {
        let channel = StateChannel::with_value(0u8);
        let mut stream = channel.stream();
        channel.set(1);
        stream.cancel();
        channel.set(2);

        let items: Vec<u8> = (&mut stream).collect().await;
        assert_eq!(items, vec![0, 1]);
    }
}

//! Event Bus (C2): an ordered, bounded, backpressure-providing channel of
//! [`Event`]s between the graph engine (single producer, since nodes run
//! sequentially within a task) and the facade's drain loop (single
//! consumer).
//!
//! Disconnect-awareness is structural, not polled: the HTTP/SSE edge holds
//! the [`EventReceiver`] half inside the stream it hands to the client.
//! When the client disconnects, axum drops that stream, which drops the
//! receiver, which makes every subsequent [`EventBus::send`] fail — at
//! which point the sender marks the shared [`CancelToken`] so every other
//! suspension point in the graph notices on its next check, without a
//! second out-of-band disconnect signal to keep in sync.

use tokio::sync::mpsc;
use wk_domain::event::Event;

use crate::cancel::CancelToken;

pub fn channel(capacity: usize) -> (EventBus, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventBus { tx }, EventReceiver { rx })
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    /// Send one event. Blocks (providing backpressure) while the channel
    /// is full. Returns `false` — and marks `cancel` — if the consumer
    /// has disconnected; callers should treat that as a cancellation
    /// signal and unwind toward `end_of_workflow` without emitting more.
    pub async fn send(&self, event: Event, cancel: &CancelToken) -> bool {
        if self.tx.send(event).await.is_err() {
            cancel.cancel();
            false
        } else {
            true
        }
    }
}

pub struct EventReceiver {
    rx: mpsc::Receiver<Event>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_succeeds_while_receiver_alive() {
        let (bus, mut rx) = channel(4);
        let cancel = CancelToken::new();
        assert!(
            bus.send(
                Event::StartOfWorkflow {
                    workflow_id: "wf".into(),
                    input: None
                },
                &cancel
            )
            .await
        );
        assert!(rx.recv().await.is_some());
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_marks_cancel() {
        let (bus, rx) = channel(4);
        drop(rx);
        let cancel = CancelToken::new();
        let ok = bus
            .send(
                Event::EndOfWorkflow {
                    workflow_id: "wf".into(),
                    messages: None,
                },
                &cancel,
            )
            .await;
        assert!(!ok);
        assert!(cancel.is_cancelled());
    }
}

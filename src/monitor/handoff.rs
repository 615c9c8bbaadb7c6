//! Zero-capacity handoff between the event reader and the event processor.
//!
//! `send` completes only once the consumer has taken the item, so the
//! producer can never run more than one item ahead of the consumer.

use tokio::sync::{mpsc, oneshot, Mutex};

struct Slot<T> {
    item: T,
    taken: oneshot::Sender<()>,
}

/// What happened to an item after `send` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Taken,
    /// Thrown away by [`HandoffReceiver::drain`] before the consumer saw it.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffClosed;

pub struct HandoffSender<T> {
    tx: mpsc::Sender<Slot<T>>,
}

pub struct HandoffReceiver<T> {
    rx: Mutex<mpsc::Receiver<Slot<T>>>,
}

pub fn handoff<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (
        HandoffSender { tx },
        HandoffReceiver {
            rx: Mutex::new(rx),
        },
    )
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> HandoffSender<T> {
    pub async fn send(&self, item: T) -> Result<Delivery, HandoffClosed> {
        let (taken, taken_rx) = oneshot::channel();
        self.tx
            .send(Slot { item, taken })
            .await
            .map_err(|_| HandoffClosed)?;
        match taken_rx.await {
            Ok(()) => Ok(Delivery::Taken),
            Err(_) if self.tx.is_closed() => Err(HandoffClosed),
            Err(_) => Ok(Delivery::Discarded),
        }
    }
}

impl<T> HandoffReceiver<T> {
    /// Wait for the next item and release its producer.
    pub async fn recv(&self) -> Option<T> {
        let slot = self.rx.lock().await.recv().await?;
        let _ = slot.taken.send(());
        Some(slot.item)
    }

    /// Discard everything currently queued without blocking. Returns the number dropped.
    ///
    /// Only effective while no consumer is parked in `recv`: a parked consumer
    /// holds the receiver and gets the queued item instead, so this returns 0.
    /// Items that reach the consumer after a rebuild must be rejected by their
    /// epoch tag, not by draining.
    pub fn drain(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };
        let mut dropped = 0;
        while let Ok(slot) = rx.try_recv() {
            drop(slot);
            dropped += 1;
        }
        dropped
    }
}

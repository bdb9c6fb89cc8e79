use crossbeam::channel::{unbounded, Receiver, Sender};

use super::Utterance;

/// FIFO handoff of finished utterances from producer to consumer
///
/// Clones share the same channel. In normal operation it holds at most one
/// item because the producer waits for it to drain before the next round.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: Sender<Utterance>,
    rx: Receiver<Utterance>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, utterance: Utterance) {
        // both ends live in self, so the channel cannot be disconnected here
        let _ = self.tx.send(utterance);
    }

    pub fn try_pop(&self) -> Option<Utterance> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

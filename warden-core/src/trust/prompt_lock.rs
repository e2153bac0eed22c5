//! Per-window serialization of security prompts.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct Turns {
    busy: bool,
    queue: VecDeque<oneshot::Sender<()>>,
}

/// A busy flag plus a FIFO of waiters. At most one [`PromptTurn`] exists per
/// lock at a time; releasing it hands the lock straight to the oldest live
/// waiter without going idle in between.
#[derive(Debug, Default)]
pub struct PromptLock {
    turns: Mutex<Turns>,
}

impl PromptLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.turns.lock().busy
    }

    pub fn queued(&self) -> usize {
        self.turns.lock().queue.len()
    }

    /// Wait for this caller's turn.
    pub async fn acquire(self: &Arc<Self>) -> PromptTurn {
        loop {
            let receiver = {
                let mut turns = self.turns.lock();
                if turns.busy {
                    let (sender, receiver) = oneshot::channel();
                    turns.queue.push_back(sender);
                    receiver
                } else {
                    turns.busy = true;
                    break;
                }
            };

            let mut waiting = QueuedTurn {
                lock: Arc::clone(self),
                receiver: Some(receiver),
            };
            if waiting.wait().await {
                break;
            }
        }

        PromptTurn {
            lock: Arc::clone(self),
            released: false,
        }
    }

    fn release(&self) {
        let mut turns = self.turns.lock();
        while let Some(next) = turns.queue.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        turns.busy = false;
    }
}

struct QueuedTurn {
    lock: Arc<PromptLock>,
    receiver: Option<oneshot::Receiver<()>>,
}

impl QueuedTurn {
    async fn wait(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        let granted = receiver.await.is_ok();
        self.receiver = None;
        granted
    }
}

impl Drop for QueuedTurn {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if receiver.try_recv().is_ok() {
                self.lock.release();
            }
        }
    }
}

/// The right to show one prompt. Released exactly once, on drop at the
/// latest.
#[derive(Debug)]
pub struct PromptTurn {
    lock: Arc<PromptLock>,
    released: bool,
}

impl PromptTurn {
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.lock.release();
        }
    }
}

impl Drop for PromptTurn {
    fn drop(&mut self) {
        self.release_once();
    }
}

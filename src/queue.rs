//! # Priority mailbox for handing work to a dedicated consumer.
//!
//! [`Mailbox`] is the thread-safe priority queue the logging and print
//! subsystems use to move work from producers (any task) to one processing
//! worker. Higher priority pops first; entries with equal priority pop in
//! FIFO order.
//!
//! ## Consumer contract
//! ```text
//! loop {
//!     match mailbox.recv().await {
//!         Some(item) => process(item),
//!         None => break,       // closed AND drained
//!     }
//! }
//! ```
//! A blocked consumer wakes on either an enqueue or a [`Mailbox::close`]
//! broadcast. After close, `recv` keeps returning queued items until the
//! mailbox is empty, then yields `None`; closing never discards work.

use std::collections::BinaryHeap;
use std::sync::Mutex;

use tokio::sync::Notify;

/// Heap entry: priority descending, then insertion order ascending.
struct Entry<T> {
    priority: u8,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority wins, then the earlier enqueue.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct MailboxState<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
    closed: bool,
}

/// Thread-safe priority mailbox with a cooperative close.
///
/// ### Properties
/// - **Priority ordering**: higher `priority` values dequeue first.
/// - **Stable within priority**: FIFO by enqueue order.
/// - **Close semantics**: `push` after `close` is rejected; `recv` drains
///   remaining items, then returns `None`.
/// - **Unbounded**: producers never block; backpressure is the consumer's
///   concern.
pub struct Mailbox<T> {
    state: Mutex<MailboxState<T>>,
    notify: Notify,
}

impl<T> Mailbox<T> {
    /// Creates an empty, open mailbox.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueues an item at the given priority.
    ///
    /// Returns `false` if the mailbox is closed (the item is dropped).
    pub fn push(&self, priority: u8, item: T) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return false;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(Entry {
                priority,
                seq,
                item,
            });
        }
        self.notify.notify_one();
        true
    }

    /// Dequeues the highest-priority item without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.state.lock().unwrap().heap.pop().map(|e| e.item)
    }

    /// Waits for the next item.
    ///
    /// Returns `None` once the mailbox is closed **and** drained. Wakes on
    /// enqueue and on close.
    pub async fn recv(&self) -> Option<T> {
        let mut notified = std::pin::pin!(self.notify.notified());
        loop {
            // Register interest before the check so a wake between the check
            // and the await is not lost.
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(entry) = state.heap.pop() {
                    return Some(entry.item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }

    /// Closes the mailbox and wakes every waiting consumer.
    ///
    /// Idempotent. Queued items remain receivable.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.notify.notify_waiters();
        // A consumer between its state check and its await holds a permit
        // slot; nudge it as well so close is never missed.
        self.notify.notify_one();
    }

    /// Returns true once [`close`](Mailbox::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    /// True when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn priority_order_then_fifo() {
        let mb = Mailbox::new();
        assert!(mb.push(0, "low-1"));
        assert!(mb.push(2, "high"));
        assert!(mb.push(0, "low-2"));
        assert!(mb.push(1, "mid"));

        assert_eq!(mb.try_recv(), Some("high"));
        assert_eq!(mb.try_recv(), Some("mid"));
        assert_eq!(mb.try_recv(), Some("low-1"));
        assert_eq!(mb.try_recv(), Some("low-2"));
        assert_eq!(mb.try_recv(), None);
    }

    #[test]
    fn push_after_close_is_rejected() {
        let mb = Mailbox::new();
        assert!(mb.push(0, 1));
        mb.close();
        assert!(!mb.push(0, 2));
        assert_eq!(mb.len(), 1);
    }

    #[tokio::test]
    async fn recv_drains_then_ends_after_close() {
        let mb = Mailbox::new();
        mb.push(1, "a");
        mb.push(0, "b");
        mb.close();

        assert_eq!(mb.recv().await, Some("a"));
        assert_eq!(mb.recv().await, Some("b"));
        assert_eq!(mb.recv().await, None);
    }

    #[tokio::test]
    async fn close_wakes_blocked_consumer() {
        let mb = Arc::new(Mailbox::<u8>::new());
        let consumer = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.recv().await })
        };

        // Give the consumer a moment to block.
        tokio::time::sleep(Duration::from_millis(10)).await;
        mb.close();

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke")
            .expect("no panic");
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn enqueue_wakes_blocked_consumer() {
        let mb = Arc::new(Mailbox::<u8>::new());
        let consumer = {
            let mb = Arc::clone(&mb);
            tokio::spawn(async move { mb.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        mb.push(0, 7);

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer woke")
            .expect("no panic");
        assert_eq!(got, Some(7));
    }
}

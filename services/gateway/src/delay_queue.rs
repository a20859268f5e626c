use futures_util::FutureExt;
use protocol::ServerEvent;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Per-socket cap; on excess the earliest-deadline entry is evicted to keep
/// the freshest data (spec §4.4).
pub const MAX_QUEUE_SIZE_PER_USER: usize = 100;
const DISPATCH_TICK: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct QueueEntry {
    deliver_at: Instant,
    accept_seq: u64,
    event: ServerEvent,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deliver_at == other.deliver_at && self.accept_seq == other.accept_seq
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deliver_at, self.accept_seq).cmp(&(other.deliver_at, other.accept_seq))
    }
}

#[derive(Default)]
struct SocketQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
}

/// Per-recipient priority queues plus the single background dispatcher that
/// drains them. Delivery, whether immediate or delayed, always goes out
/// through the socket's registered sender — that's the one place allowed to
/// write to the socket (spec §5: "socket write operations are serialized
/// per socket").
#[derive(Clone)]
pub struct DelayQueue {
    queues: Arc<RwLock<HashMap<String, Arc<Mutex<SocketQueue>>>>>,
    senders: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<ServerEvent>>>>,
    accept_seq: Arc<AtomicU64>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
            senders: Arc::new(RwLock::new(HashMap::new())),
            accept_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn register_socket(&self, socket_id: String, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.senders.write().await.insert(socket_id.clone(), sender);
        self.queues
            .write()
            .await
            .insert(socket_id, Arc::new(Mutex::new(SocketQueue::default())));
    }

    pub async fn clear_queue(&self, socket_id: &str) {
        self.queues.write().await.remove(socket_id);
        self.senders.write().await.remove(socket_id);
    }

    pub async fn deliver_immediately(&self, socket_id: &str, event: ServerEvent) {
        if let Some(sender) = self.senders.read().await.get(socket_id) {
            let _ = sender.send(event);
        }
    }

    pub async fn enqueue(&self, socket_id: &str, event: ServerEvent, deliver_at: Instant) {
        let queue = self.queues.read().await.get(socket_id).cloned();
        let Some(queue) = queue else { return };
        let accept_seq = self.accept_seq.fetch_add(1, Ordering::Relaxed);
        let mut queue = queue.lock().await;
        if queue.heap.len() >= MAX_QUEUE_SIZE_PER_USER {
            if let Some(Reverse(evicted)) = queue.heap.pop() {
                warn!(
                    socket_id,
                    evicted_accept_seq = evicted.accept_seq,
                    "delay queue full, evicting earliest-deadline entry"
                );
            }
        }
        queue.heap.push(Reverse(QueueEntry {
            deliver_at,
            accept_seq,
            event,
        }));
    }

    pub fn spawn_dispatcher(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DISPATCH_TICK);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.dispatch_tick().await,
                }
            }
        })
    }

    async fn dispatch_tick(&self) {
        let now = Instant::now();
        let socket_ids: Vec<String> = self.queues.read().await.keys().cloned().collect();
        for socket_id in socket_ids {
            let queue = self.queues.read().await.get(&socket_id).cloned();
            let Some(queue) = queue else { continue };

            let due = AssertUnwindSafe(drain_due(&queue, now)).catch_unwind().await;
            let due = match due {
                Ok(due) => due,
                Err(_) => {
                    error!(socket_id, "delay queue dispatcher panicked on this socket, continuing");
                    continue;
                }
            };
            if due.is_empty() {
                continue;
            }
            if let Some(sender) = self.senders.read().await.get(&socket_id) {
                for entry in due {
                    let _ = sender.send(entry.event);
                }
            }
        }
    }
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain_due(queue: &Mutex<SocketQueue>, now: Instant) -> Vec<QueueEntry> {
    let mut due = Vec::new();
    let mut q = queue.lock().await;
    while let Some(Reverse(entry)) = q.heap.peek() {
        if entry.deliver_at > now {
            break;
        }
        if let Some(Reverse(entry)) = q.heap.pop() {
            due.push(entry);
        }
    }
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ErrorPayload, OffsetUpdatedPayload};

    fn err_event(tag: &str) -> ServerEvent {
        ServerEvent::Error(ErrorPayload {
            message: tag.to_owned(),
        })
    }

    #[tokio::test]
    async fn deliver_immediately_bypasses_the_queue() {
        let dq = DelayQueue::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dq.register_socket("s1".to_owned(), tx).await;
        dq.deliver_immediately("s1", err_event("now")).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received, err_event("now"));
    }

    #[tokio::test]
    async fn dispatcher_delivers_in_deadline_order_with_fifo_on_ties() {
        let dq = DelayQueue::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dq.register_socket("s1".to_owned(), tx).await;

        let now = Instant::now();
        let past = now - Duration::from_millis(10);
        dq.enqueue("s1", err_event("second"), past).await;
        dq.enqueue("s1", err_event("first-by-tie"), past).await;

        let cancel = CancellationToken::new();
        let handle = dq.clone().spawn_dispatcher(cancel.clone());
        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
        let _ = handle.await;

        assert_eq!(rx.recv().await.unwrap(), err_event("second"));
        assert_eq!(rx.recv().await.unwrap(), err_event("first-by-tie"));
    }

    #[tokio::test]
    async fn enqueue_beyond_capacity_evicts_earliest_deadline_entry() {
        let dq = DelayQueue::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        dq.register_socket("s1".to_owned(), tx).await;

        let now = Instant::now();
        for i in 0..MAX_QUEUE_SIZE_PER_USER {
            let deliver_at = now + Duration::from_secs(i as u64 + 1);
            dq.enqueue("s1", err_event("filler"), deliver_at).await;
        }
        // One more, with a deadline further out than everything already
        // queued, should evict the earliest (index 0) rather than itself.
        let newest_deadline = now + Duration::from_secs(MAX_QUEUE_SIZE_PER_USER as u64 + 50);
        dq.enqueue("s1", ServerEvent::OffsetUpdated(OffsetUpdatedPayload { offset_ms: 1 }), newest_deadline)
            .await;

        let queue = dq.queues.read().await.get("s1").cloned().unwrap();
        let q = queue.lock().await;
        assert_eq!(q.heap.len(), MAX_QUEUE_SIZE_PER_USER);
    }

    #[tokio::test]
    async fn clear_queue_drops_pending_entries_and_sender() {
        let dq = DelayQueue::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dq.register_socket("s1".to_owned(), tx).await;
        dq.enqueue("s1", err_event("pending"), Instant::now() + Duration::from_secs(5))
            .await;
        dq.clear_queue("s1").await;
        dq.deliver_immediately("s1", err_event("after-clear")).await;
        drop(dq);
        assert!(rx.recv().await.is_none());
    }
}

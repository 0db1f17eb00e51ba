//! Bounded receive queue — a mutex-guarded ring of received units feeding
//! the single consumer.

use parking_lot::Mutex;
use tokio::sync::Notify;

use flowbridge_core::{FullQueuePolicy, Unit};

use crate::signal::WakeupSignal;

struct Ring {
    slots: Vec<Option<Unit>>,
    head: usize,
    tail: usize,
    occupied: usize,
}

impl Ring {
    fn insert(&mut self, unit: Unit) {
        debug_assert!(self.occupied < self.slots.len());
        self.slots[self.tail] = Some(unit);
        self.tail = (self.tail + 1) % self.slots.len();
        self.occupied += 1;
    }

    fn take(&mut self) -> Option<Unit> {
        if self.occupied == 0 {
            return None;
        }
        let unit = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.occupied -= 1;
        unit
    }
}

/// Multi-producer, single-consumer ring of received units.
///
/// Push order is the order producers acquire the lock; pops are strict
/// FIFO relative to pushes. Per-flow order is preserved because each flow
/// has exactly one reader task serializing its own pushes.
///
/// A full queue either parks the producer until a slot frees or evicts the
/// oldest unit, per policy. It never drops silently and never spins.
pub struct PacketQueue {
    ring: Mutex<Ring>,
    space: Notify,
    signal: WakeupSignal,
    policy: FullQueuePolicy,
    capacity: usize,
}

impl PacketQueue {
    pub fn new(capacity: usize, policy: FullQueuePolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                occupied: 0,
            }),
            space: Notify::new(),
            signal: WakeupSignal::new(),
            policy,
            capacity,
        }
    }

    /// The wakeup signal raised once per enqueued unit.
    pub fn signal(&self) -> &WakeupSignal {
        &self.signal
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupied(&self) -> usize {
        self.ring.lock().occupied
    }

    /// Enqueue one unit, raising the wakeup signal after the lock drops.
    ///
    /// With [`FullQueuePolicy::Block`] a full queue parks this producer
    /// until the consumer frees a slot. With [`FullQueuePolicy::EvictOldest`]
    /// the oldest unit is dropped to make room; occupancy (and therefore
    /// the signal count) is unchanged in that case, so the signal is not
    /// raised a second time.
    pub async fn push(&self, mut unit: Unit) {
        loop {
            // Arm the waiter before checking so a pop between the check and
            // the await cannot be missed: notify_one stores a permit.
            let space = self.space.notified();
            unit = {
                let mut ring = self.ring.lock();
                if ring.occupied < self.capacity {
                    ring.insert(unit);
                    drop(ring);
                    self.signal.raise();
                    return;
                }
                if self.policy == FullQueuePolicy::EvictOldest {
                    let evicted = ring.take();
                    ring.insert(unit);
                    drop(ring);
                    if let Some(evicted) = evicted {
                        tracing::warn!(
                            from = %evicted.from,
                            len = evicted.payload.len(),
                            "receive queue full, evicted oldest unit"
                        );
                    }
                    return;
                }
                unit
            };
            space.await;
        }
    }

    /// Dequeue the oldest unit, or `None` when the queue is empty.
    ///
    /// Does not touch the wakeup signal; the consumer pairs this with
    /// [`WakeupSignal::try_consume`].
    pub fn pop(&self) -> Option<Unit> {
        let unit = self.ring.lock().take()?;
        self.space.notify_one();
        Some(unit)
    }
}

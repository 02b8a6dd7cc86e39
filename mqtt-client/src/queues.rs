use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use mqtt_core::{Packet, PacketType};

/// Per-packet-type capacity, matching the bounded, drop-oldest queues the
/// transaction correlator reads from. One transaction in flight rarely needs
/// more than one slot; the slack absorbs an auto-ack racing a caller retry.
const QUEUE_CAPACITY: usize = 5;
const SLOT_COUNT: usize = 14;

fn slot_index(t: PacketType) -> usize {
    (t as u8 - 1) as usize
}

/// One bounded, condvar-backed queue per response packet type, guarded by a
/// single mutex so `clear` and `put` each happen atomically.
pub(crate) struct InboundQueues {
    slots: Mutex<[VecDeque<Packet>; SLOT_COUNT]>,
    ready: [Condvar; SLOT_COUNT],
    broken: AtomicBool,
}

impl InboundQueues {
    pub fn new() -> Self {
        InboundQueues {
            slots: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            ready: std::array::from_fn(|_| Condvar::new()),
            broken: AtomicBool::new(false),
        }
    }

    pub fn clear(&self, t: PacketType) {
        self.slots.lock().unwrap()[slot_index(t)].clear();
    }

    pub fn put(&self, t: PacketType, packet: Packet) {
        let idx = slot_index(t);
        {
            let mut slots = self.slots.lock().unwrap();
            let queue = &mut slots[idx];
            queue.push_back(packet);
            while queue.len() > QUEUE_CAPACITY {
                queue.pop_front();
            }
        }
        self.ready[idx].notify_all();
    }

    /// Blocks until a packet of type `t` arrives, `timeout` elapses, or the
    /// receiver declares the connection broken.
    pub fn wait_and_take(&self, t: PacketType, timeout: Duration) -> Option<Packet> {
        let idx = slot_index(t);
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock().unwrap();
        loop {
            if let Some(packet) = slots[idx].pop_front() {
                return Some(packet);
            }
            if self.broken.load(Ordering::Acquire) {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.ready[idx].wait_timeout(slots, deadline - now).unwrap();
            slots = guard;
            if result.timed_out() && slots[idx].is_empty() {
                return None;
            }
        }
    }

    /// Wakes every waiter so a dead receiver doesn't leave callers blocked
    /// until their timeout.
    pub fn notify_broken(&self) {
        self.broken.store(true, Ordering::Release);
        for condvar in &self.ready {
            condvar.notify_all();
        }
    }
}

//! Bounded admission queue between the acceptor and the worker pool.
//!
//! A fixed ring of slots guarded by a mutex, with two counting semaphores
//! tracking free and filled slots. Producers block while the ring is full and
//! consumers block while it is empty.

use parking_lot::{Condvar, Mutex};

use crate::error::ServerError;

/// Counting semaphore.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Blocks until a permit is available and takes it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    pub fn release(&self) {
        *self.permits.lock() += 1;
        self.available.notify_one();
    }

    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }
}

#[derive(Debug)]
struct Ring<T> {
    slots: Vec<Option<T>>,
    read: usize,
    write: usize,
}

#[derive(Debug)]
pub struct AdmissionQueue<T> {
    ring: Mutex<Ring<T>>,
    slots_empty: Semaphore,
    slots_full: Semaphore,
    capacity: usize,
}

impl<T> AdmissionQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, ServerError> {
        if capacity == 0 {
            return Err(ServerError::ZeroCapacity);
        }
        Ok(Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                read: 0,
                write: 0,
            }),
            slots_empty: Semaphore::new(capacity),
            slots_full: Semaphore::new(0),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued items not yet taken by a consumer.
    pub fn len(&self) -> usize {
        self.slots_full.available_permits()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues `item`, blocking while every slot is taken.
    pub fn push(&self, item: T) {
        self.slots_empty.acquire();
        {
            let mut ring = self.ring.lock();
            let write = ring.write;
            ring.slots[write] = Some(item);
            ring.write = (write + 1) % self.capacity;
        }
        self.slots_full.release();
    }

    /// Dequeues the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        self.slots_full.acquire();
        let item = {
            let mut ring = self.ring.lock();
            let read = ring.read;
            ring.read = (read + 1) % self.capacity;
            ring.slots[read].take()
        };
        self.slots_empty.release();
        match item {
            Some(item) => item,
            None => unreachable!("filled-slot permit without a queued item"),
        }
    }
}

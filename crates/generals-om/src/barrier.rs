//! Completion barrier built from a chain of one-shot gates.
//!
//! Each arriving lieutenant takes the next slot under the arrival lock. The
//! lieutenant that takes the last slot opens gate 0 before it counts itself,
//! so gate 0 opens exactly once and only when every slot is taken. Each
//! lieutenant then waits on the gate of its own slot and, once through,
//! opens the next one; the last slot opens the initiator's release instead.

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// Lets the initiator wait until `expected` lieutenants have arrived.
#[derive(Debug)]
pub struct CompletionBarrier {
    expected: usize,
    arrivals: Mutex<usize>,
    gates: Vec<Semaphore>,
    released: Semaphore,
}

impl CompletionBarrier {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrivals: Mutex::new(0),
            gates: (0..expected).map(|_| Semaphore::new(0)).collect(),
            released: Semaphore::new(0),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Arrivals counted so far.
    pub async fn arrivals(&self) -> usize {
        *self.arrivals.lock().await
    }

    /// Register one arrival and wait for this slot's gate to open.
    ///
    /// Returns the slot taken, or `None` if every slot was already taken or
    /// the barrier was closed while waiting.
    pub async fn arrive(&self) -> Option<usize> {
        let slot = {
            let mut arrivals = self.arrivals.lock().await;
            let slot = *arrivals;
            if slot >= self.expected {
                warn!(slot, expected = self.expected, "arrival past the last slot");
                return None;
            }
            if slot + 1 == self.expected {
                self.gates[0].add_permits(1);
            }
            *arrivals += 1;
            slot
        };
        debug!(slot, expected = self.expected, "arrived at completion barrier");

        let permit = self.gates[slot].acquire().await.ok()?;
        permit.forget();

        if slot + 1 < self.expected {
            self.gates[slot + 1].add_permits(1);
        } else {
            self.released.add_permits(1);
        }
        Some(slot)
    }

    /// Wait until the last gate in the chain has opened.
    ///
    /// Returns `false` if the barrier was closed first.
    pub async fn wait(&self) -> bool {
        match self.released.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Close every gate, waking anything still waiting.
    pub fn close(&self) {
        for gate in &self.gates {
            gate.close();
        }
        self.released.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn single_lieutenant_releases_immediately() {
        let barrier = CompletionBarrier::new(1);
        assert_eq!(barrier.arrive().await, Some(0));
        assert!(barrier.wait().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn releases_only_after_every_arrival() {
        let barrier = Arc::new(CompletionBarrier::new(6));
        assert_eq!(barrier.expected(), 6);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move { barrier.arrive().await }));
        }

        tokio::task::yield_now().await;
        let early = tokio::time::timeout(Duration::from_millis(50), barrier.wait()).await;
        assert!(early.is_err(), "released with an arrival missing");
        assert_eq!(barrier.arrivals().await, 5);

        let last = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.arrive().await })
        };
        assert!(barrier.wait().await);

        let mut slots: Vec<usize> = Vec::new();
        for handle in handles {
            slots.push(handle.await.unwrap().unwrap());
        }
        slots.push(last.await.unwrap().unwrap());
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn extra_arrivals_are_turned_away() {
        let barrier = CompletionBarrier::new(1);
        assert_eq!(barrier.arrive().await, Some(0));
        assert_eq!(barrier.arrive().await, None);
        assert_eq!(barrier.arrivals().await, 1);
    }

    #[tokio::test]
    async fn close_wakes_the_waiting_initiator() {
        let barrier = Arc::new(CompletionBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move { barrier.wait().await })
        };
        tokio::task::yield_now().await;
        barrier.close();
        assert!(!waiter.await.unwrap());
    }
}

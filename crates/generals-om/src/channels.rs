//! Bounded FIFO channels indexed by (recursion depth, destination).
//!
//! Depth 0 carries the commander's seeds: one message per lieutenant,
//! written by the initiator and read by that lieutenant's task. Deeper cells
//! are written by the dissemination engine and never read during a run;
//! they are an audit trail that can be drained afterwards.

use tokio::sync::{mpsc, watch, Mutex};
use tracing::warn;

use crate::config::SessionConfig;
use crate::general::GeneralId;
use crate::message::Message;

struct Cell {
    tx: mpsc::Sender<Message>,
    rx: Mutex<mpsc::Receiver<Message>>,
    capacity: usize,
}

impl Cell {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }
}

/// `(m + 1) x n` grid of bounded message queues.
pub struct ChannelMatrix {
    cells: Vec<Vec<Cell>>,
    closed: watch::Sender<bool>,
}

impl ChannelMatrix {
    /// Allocate every cell for `config`.
    ///
    /// A depth-`d` cell (`d >= 1`) receives one copy per forwarding path of
    /// `m - d + 1` hops into its destination, i.e. `(n - 2)^(m - d + 1)`.
    pub fn new(config: &SessionConfig) -> Self {
        let participants = config.participants();
        let top = config.traitor_count();

        let cells = (0..=top)
            .map(|depth| {
                let capacity = cell_capacity(participants, top, depth);
                (0..participants).map(|_| Cell::new(capacity)).collect()
            })
            .collect();

        let (closed, _) = watch::channel(false);
        Self { cells, closed }
    }

    /// Number of depth rows, `m + 1`.
    pub fn depths(&self) -> usize {
        self.cells.len()
    }

    pub fn capacity(&self, depth: usize, destination: GeneralId) -> usize {
        self.cell(depth, destination).map_or(0, |cell| cell.capacity)
    }

    /// Enqueue without waiting. Returns `false` if the copy was dropped.
    pub fn post(&self, depth: usize, destination: GeneralId, message: Message) -> bool {
        let Some(cell) = self.cell(depth, destination) else {
            warn!(depth, %destination, "no channel for message");
            return false;
        };
        if self.is_closed() {
            warn!(depth, %destination, %message, "channels closed, dropping message");
            return false;
        }

        match cell.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(depth, %destination, %message, capacity = cell.capacity, "channel full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                warn!(depth, %destination, %message, "channel closed, dropping message");
                false
            }
        }
    }

    /// Wait for the depth-0 seed addressed to `destination`.
    ///
    /// Returns `None` once the matrix is closed, even for a reader that is
    /// already parked on the cell.
    pub async fn take_seed(&self, destination: GeneralId) -> Option<Message> {
        let cell = self.cell(0, destination)?;
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => None,
            message = async { cell.rx.lock().await.recv().await } => message,
        }
    }

    /// Everything currently queued in one cell, in arrival order.
    ///
    /// Returns nothing if a reader is currently holding the cell.
    pub fn drain(&self, depth: usize, destination: GeneralId) -> Vec<Message> {
        let Some(cell) = self.cell(depth, destination) else {
            return Vec::new();
        };
        let Ok(mut rx) = cell.rx.try_lock() else {
            return Vec::new();
        };

        let mut drained = Vec::new();
        while let Ok(message) = rx.try_recv() {
            drained.push(message);
        }
        drained
    }

    /// Refuse further posts and wake every `take_seed` with `None`.
    ///
    /// Queued messages stay drainable.
    pub fn close(&self) {
        self.closed.send_replace(true);
        for cell in self.cells.iter().flatten() {
            if let Ok(mut rx) = cell.rx.try_lock() {
                rx.close();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn cell(&self, depth: usize, destination: GeneralId) -> Option<&Cell> {
        self.cells.get(depth)?.get(destination.index())
    }
}

impl std::fmt::Debug for ChannelMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let capacities: Vec<usize> = self
            .cells
            .iter()
            .map(|row| row.first().map_or(0, |cell| cell.capacity))
            .collect();
        f.debug_struct("ChannelMatrix")
            .field("depths", &self.depths())
            .field("capacities", &capacities)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn cell_capacity(participants: usize, top: usize, depth: usize) -> usize {
    if depth == 0 {
        return 1;
    }
    let hops = (top - depth + 1) as u32;
    participants.saturating_sub(2).pow(hops).max(1)
}

//! Live S2S link handles.
//!
//! The per-link read/write tasks live in [`crate::s2s::session`]; this
//! module holds the handle other subsystems use to reach a neighbour.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use lark_proto::Message;
use parking_lot::Mutex;

use crate::broker::{Priority, SendQueue};

/// A connected, handshake-complete neighbour.
#[derive(Debug)]
pub struct LinkHandle {
    /// Neighbour SID.
    pub sid: String,
    /// Neighbour server name.
    pub name: String,
    /// Outbound frame queue drained by the link writer task.
    pub queue: Arc<SendQueue>,
    /// Last PONG receipt, for the link ping timer.
    pub last_pong: Mutex<Instant>,
    /// Set once our burst has been sent.
    pub bursted: AtomicBool,
}

impl LinkHandle {
    /// Create a handle around an outbound queue.
    pub fn new(sid: &str, name: &str, queue: Arc<SendQueue>) -> Self {
        Self {
            sid: sid.to_string(),
            name: name.to_string(),
            queue,
            last_pong: Mutex::new(Instant::now()),
            bursted: AtomicBool::new(false),
        }
    }

    /// Queue a frame for this neighbour.
    pub fn send(&self, msg: &Message) {
        self.queue.push(Arc::new(msg.clone()), Priority::Interactive);
    }

    /// Mark the burst sent. Returns false if it already was.
    pub fn mark_bursted(&self) -> bool {
        !self.bursted.swap(true, Ordering::AcqRel)
    }
}

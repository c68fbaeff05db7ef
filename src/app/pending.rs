//! Bounded FIFO of directives awaiting transmission to the peer.
//!
//! Every outbound directive goes through here, whatever its source (peer
//! startup, backend command, status poll), so the serial order matches the
//! order the relay decided on.  A line the UART refuses stays at the head
//! and is retried on the next flush.
//!
//! Peer reactions (the `set_mode` answering a startup) are admitted even
//! when the queue is full: the oldest other directive is evicted for them.

use core::mem;

use heapless::Deque;

use super::ports::{LinkError, PeerLinkPort};
use crate::wire::codec::encode_line;
use crate::wire::messages::Directive;

/// Maximum number of directives held while the link is busy.
pub const PENDING_CAPACITY: usize = 10;

pub struct PendingCommandQueue {
    queue: Deque<Directive, PENDING_CAPACITY>,
}

impl Default for PendingCommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingCommandQueue {
    pub fn new() -> Self {
        Self { queue: Deque::new() }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Append a directive.  When full the directive is handed back.
    pub fn push(&mut self, directive: Directive) -> Result<(), Directive> {
        self.queue.push_back(directive)
    }

    /// Append a directive that must not be lost.
    ///
    /// When full, the oldest directive that is not a `set_mode` is evicted
    /// and returned; if every slot holds one, the oldest is evicted.
    pub fn push_urgent(&mut self, directive: Directive) -> Option<Directive> {
        if !self.queue.is_full() {
            // Cannot fail: capacity checked above.
            let _ = self.queue.push_back(directive);
            return None;
        }

        let victim = self
            .queue
            .iter()
            .position(|d| !matches!(d, Directive::SetMode { .. }))
            .unwrap_or(0);

        let mut kept = Deque::new();
        let mut evicted = None;
        for (i, queued) in mem::take(&mut self.queue).into_iter().enumerate() {
            if i == victim {
                evicted = Some(queued);
            } else {
                let _ = kept.push_back(queued);
            }
        }
        let _ = kept.push_back(directive);
        self.queue = kept;
        evicted
    }

    /// Write queued directives in order until the queue is empty or the
    /// link refuses a line.
    ///
    /// `on_sent` is called for each directive that left the queue.
    pub fn flush(
        &mut self,
        peer: &mut impl PeerLinkPort,
        now_ms: u64,
        mut on_sent: impl FnMut(&Directive),
    ) -> Result<usize, LinkError> {
        let mut sent = 0;
        while let Some(head) = self.queue.front() {
            let line = encode_line(head.kind(), head.payload(), now_ms);
            peer.write_line(&line)?;
            if let Some(directive) = self.queue.pop_front() {
                on_sent(&directive);
                sent += 1;
            }
        }
        Ok(sent)
    }
}

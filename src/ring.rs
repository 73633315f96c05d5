//! Per-socket circular byte buffer.
//!
//! One `Ring` backs each `INUSE` slot, sized to `BUF_CAP` and heap-allocated
//! once on `open` — the same "allocate once, own for the
//! life of the slot" shape as `ipc::anon_pipe::AnonPipe`'s `VecDeque`,
//! except this ring is an explicit fixed-capacity circular buffer
//! (`pos`/`size` over a fixed backing store) rather than a growable deque,
//! so wrap-around is handled explicitly here instead of by the collection.

use alloc::boxed::Box;
use alloc::vec;

use crate::collab::{Endpoint, EndpointCopy, Grant};
use crate::error::Result;

/// Fixed-capacity circular byte buffer.
pub struct Ring {
    buf: Box<[u8]>,
    /// Offset of the oldest unread byte.
    pos: usize,
    /// Number of valid bytes currently buffered.
    size: usize,
}

impl Ring {
    /// Allocate a new, empty ring of the given capacity.
    pub fn new(cap: usize) -> Self {
        Ring {
            buf: vec![0u8; cap].into_boxed_slice(),
            pos: 0,
            size: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size == self.buf.len()
    }

    pub fn free_space(&self) -> usize {
        self.buf.len() - self.size
    }

    /// Drain up to `n` bytes into `(dst_endpt, grant)`, advancing `pos` and
    /// shrinking `size`. Copies via at most two contiguous segments.
    /// Resets `pos` to 0 once the ring empties — an observable but
    /// not load-bearing optimisation that avoids unnecessary wrap copies.
    pub fn read_bytes<C: EndpointCopy>(
        &mut self,
        copy: &mut C,
        dst_endpt: Endpoint,
        grant: Grant,
        n: usize,
    ) -> Result<usize> {
        let n = n.min(self.size);
        if n == 0 {
            return Ok(0);
        }
        let cap = self.buf.len();
        let first = (cap - self.pos).min(n);
        let second = n - first;

        let copied_first = copy.copy_out(dst_endpt, grant, 0, &self.buf[self.pos..self.pos + first])?;
        let mut total = copied_first;
        if copied_first == first && second > 0 {
            let copied_second = copy.copy_out(dst_endpt, grant, first, &self.buf[0..second])?;
            total += copied_second;
        }

        self.pos = (self.pos + total) % cap;
        self.size -= total;
        if self.size == 0 {
            self.pos = 0;
        }
        Ok(total)
    }

    /// Fill up to `n` bytes from `(src_endpt, grant)`, starting at
    /// `(pos + size) mod cap`, growing `size`.
    pub fn write_bytes<C: EndpointCopy>(
        &mut self,
        copy: &mut C,
        src_endpt: Endpoint,
        grant: Grant,
        n: usize,
    ) -> Result<usize> {
        let n = n.min(self.free_space());
        if n == 0 {
            return Ok(0);
        }
        let cap = self.buf.len();
        let start = (self.pos + self.size) % cap;
        let first = (cap - start).min(n);
        let second = n - first;

        let copied_first = copy.copy_in(src_endpt, grant, 0, &mut self.buf[start..start + first])?;
        let mut total = copied_first;
        if copied_first == first && second > 0 {
            let copied_second = copy.copy_in(src_endpt, grant, first, &mut self.buf[0..second])?;
            total += copied_second;
        }

        self.size += total;
        Ok(total)
    }
}

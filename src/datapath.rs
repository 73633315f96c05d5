//! The data path: `perform_read` and `perform_write`.
//!
//! This is the core state machine — it ties a socket to its peer, enforces
//! per-type semantics (stream/seqpacket/dgram), moves bytes through the
//! ring, and schedules wakeups and select notifications. Every other
//! component (suspension replay, select's "pretend" probes, the dispatcher
//! entry points) goes through these two functions; there is no second copy
//! of the flow-control logic anywhere else.

use crate::collab::{Endpoint, EndpointCopy, Grant, ReplySink, SelectMask};
use crate::error::UdsError;
use crate::table::{Mode, SlotId, SockType, SocketTable, SuspendKind, BUF_CAP};

/// Outcome of a (possibly "pretend") data-path call. `Blocked` is the
/// internal "would block" sentinel; it is
/// never itself handed back to a caller of the crate — dispatch.rs turns it
/// into a parked suspension, `EAGAIN`/`EINPROGRESS`, or a select "not ready"
/// bit, depending on who asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPathResult {
    Ready(usize),
    Blocked,
    Err(UdsError),
}

/// Read up to `n` bytes from `minor`'s own ring.
///
/// `pretend` reports the outcome without mutating state or copying bytes —
/// used by `select`.
pub fn perform_read<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    dst_endpt: Endpoint,
    grant: Grant,
    n: usize,
    pretend: bool,
    copy: &mut C,
    replies: &mut S,
) -> DataPathResult {
    if n == 0 {
        return DataPathResult::Ready(0);
    }

    let slot = match table.get(minor) {
        Some(s) => s,
        None => return DataPathResult::Err(UdsError::NoSuchDevice),
    };
    if !slot.mode.has(Mode::R) {
        return DataPathResult::Err(UdsError::BrokenPipe);
    }

    let size = slot.ring.as_ref().map(|r| r.len()).unwrap_or(0);
    if size == 0 {
        let peer = slot.peer;
        let ty = slot.ty;
        match peer {
            None => match ty {
                SockType::Stream | SockType::Seqpacket => {
                    let reset_pending = slot.err == Some(UdsError::ConnectionReset);
                    if reset_pending {
                        if !pretend {
                            table.get_mut(minor).unwrap().err = None;
                        }
                        return DataPathResult::Err(UdsError::ConnectionReset);
                    }
                    return DataPathResult::Err(UdsError::NotConnected);
                }
                // Neither named type in spec.md §4.3 step 3; an unconfigured
                // socket has no data and no peer, so it falls through to the
                // same blocking check DGRAM does rather than short-circuiting.
                SockType::Dgram | SockType::Unset => {}
            },
            Some(peer_id) => {
                let peer_has_w = table.get(peer_id).map(|p| p.mode.has(Mode::W)).unwrap_or(false);
                if !peer_has_w {
                    return DataPathResult::Ready(0); // EOF: peer's write half is closed
                }
                debug_assert!(
                    table
                        .get(peer_id)
                        .map(|p| p.suspended != SuspendKind::Write)
                        .unwrap_or(true),
                    "bug: writer suspended while reader sees an empty buffer with a live peer"
                );
            }
        }
        return DataPathResult::Blocked;
    }

    let n = n.min(size);
    if pretend {
        return DataPathResult::Ready(n);
    }

    let drained = {
        let slot = table.get_mut(minor).unwrap();
        let ring = slot.ring.as_mut().unwrap();
        match ring.read_bytes(copy, dst_endpt, grant, n) {
            Ok(k) => k,
            Err(e) => return DataPathResult::Err(e),
        }
    };

    if let Some(peer_id) = table.get(minor).and_then(|s| s.peer) {
        if table.get(peer_id).map(|p| p.suspended == SuspendKind::Write).unwrap_or(false) {
            crate::suspend::unsuspend(table, peer_id, copy, replies);
        }
        let peer_watching_write = table.get(peer_id).map(|p| p.sel_ops.contains(SelectMask::WRITE)).unwrap_or(false);
        if peer_watching_write {
            let full = table
                .get(minor)
                .and_then(|s| s.ring.as_ref())
                .map(|r| r.is_full())
                .unwrap_or(false);
            if !full {
                crate::select::notify(table, peer_id, SelectMask::WRITE, replies);
            }
        }
    }

    DataPathResult::Ready(drained)
}

/// Write up to `n` bytes from `minor` into its target's ring.
pub fn perform_write<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    src_endpt: Endpoint,
    grant: Grant,
    n: usize,
    pretend: bool,
    copy: &mut C,
    replies: &mut S,
) -> DataPathResult {
    if n == 0 {
        return DataPathResult::Ready(0);
    }

    let slot = match table.get(minor) {
        Some(s) => s,
        None => return DataPathResult::Err(UdsError::NoSuchDevice),
    };
    if !slot.mode.has(Mode::W) {
        return DataPathResult::Err(UdsError::BrokenPipe);
    }
    let ty = slot.ty;
    if n > BUF_CAP && !matches!(ty, SockType::Stream) {
        return DataPathResult::Err(UdsError::MessageSize);
    }

    let target_id = match ty {
        SockType::Stream | SockType::Seqpacket => match slot.peer {
            None => {
                let reset_pending = slot.err == Some(UdsError::ConnectionReset);
                if reset_pending {
                    if !pretend {
                        table.get_mut(minor).unwrap().err = None;
                    }
                    return DataPathResult::Err(UdsError::ConnectionReset);
                }
                return DataPathResult::Err(UdsError::NotConnected);
            }
            Some(peer_id) => {
                let still_connecting = table.get(peer_id).map(|p| p.peer.is_none()).unwrap_or(false);
                if still_connecting {
                    return DataPathResult::Blocked;
                }
                peer_id
            }
        },
        SockType::Dgram => {
            let target_addr = slot.target;
            match table.find_dgram_by_addr(&target_addr) {
                Some(id) => id,
                None => return DataPathResult::Err(UdsError::NoEntry),
            }
        }
        // Not named in spec.md §4.4 step 4 either; an unconfigured socket has
        // no target to fill, so it parks the same as a write finding its
        // stream peer still connecting rather than erroring out early.
        SockType::Unset => return DataPathResult::Blocked,
    };

    let target_readable = table.get(target_id).map(|t| t.mode.has(Mode::R)).unwrap_or(false);
    if !target_readable {
        return DataPathResult::Err(UdsError::BrokenPipe);
    }

    let target_size = table.get(target_id).and_then(|t| t.ring.as_ref()).map(|r| r.len()).unwrap_or(0);

    if matches!(ty, SockType::Dgram) && target_size > 0 {
        // A datagram is already queued and unread: drop the new one silently.
        return DataPathResult::Ready(n);
    }

    let target_full = target_size == BUF_CAP;
    let seqpacket_one_at_a_time = matches!(ty, SockType::Seqpacket) && target_size > 0;
    if target_full || seqpacket_one_at_a_time {
        debug_assert!(
            table
                .get(target_id)
                .map(|t| t.suspended != SuspendKind::Read)
                .unwrap_or(true),
            "bug: reader suspended on a full target buffer"
        );
        return DataPathResult::Blocked;
    }

    let n = n.min(BUF_CAP - target_size);
    if pretend {
        return DataPathResult::Ready(n);
    }

    let written = {
        let target_slot = table.get_mut(target_id).unwrap();
        let ring = target_slot.ring.as_mut().unwrap();
        match ring.write_bytes(copy, src_endpt, grant, n) {
            Ok(k) => k,
            Err(e) => return DataPathResult::Err(e),
        }
    };

    if matches!(ty, SockType::Dgram) {
        let src_addr = table.get(minor).unwrap().addr;
        table.get_mut(target_id).unwrap().source = src_addr;
    }

    if table.get(target_id).map(|t| t.suspended == SuspendKind::Read).unwrap_or(false) {
        crate::suspend::unsuspend(table, target_id, copy, replies);
    }
    let target_watching_read = table.get(target_id).map(|t| t.sel_ops.contains(SelectMask::READ)).unwrap_or(false);
    if target_watching_read {
        let has_data = table
            .get(target_id)
            .and_then(|t| t.ring.as_ref())
            .map(|r| !r.is_empty())
            .unwrap_or(false);
        if has_data {
            crate::select::notify(table, target_id, SelectMask::READ, replies);
        }
    }

    DataPathResult::Ready(written)
}

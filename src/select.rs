//! Select/poll readiness: an immediate probe plus a
//! registration path for asynchronous notification.
//!
//! Readiness is computed by literally re-running the data path in "pretend"
//! mode rather than duplicating its rules in a second predicate — the same
//! "ask the real routine, don't re-derive its answer" approach
//! `ipc::anon_pipe`'s poll hook uses to stay in sync with its own read/write
//! logic as it evolves.

use crate::collab::{Endpoint, EndpointCopy, ReplySink, SelectMask};
use crate::datapath::{perform_read, perform_write, DataPathResult};
use crate::error::Result;
use crate::table::{SlotId, SocketTable};

/// Probe `minor` for the readiness bits present in `interest`'s
/// `READ`/`WRITE`/`ERR` bits. If `interest` also carries the `NOTIFY` bit,
/// any of those bits not yet ready are registered into
/// `sel_endpt`/`sel_ops` so a later state change can [`notify`] them;
/// without `NOTIFY` this is a pure one-shot poll that never touches the
/// slot's registration.
///
/// A bit is "ready now" only when the pretend probe returns a positive byte
/// count, or (for `READ` on a listening socket) the backlog is non-empty, or
/// the probe fails with an error other than "would block". A `Ready(0)`
/// pretend result — an EOF'd peer, say — satisfies none of the three and is
/// therefore reported as not ready; the caller relies on the direct
/// EOF-on-read to observe it.
pub fn select<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    interest: SelectMask,
    sel_endpt: Endpoint,
    copy: &mut C,
    _replies: &mut S,
) -> Result<SelectMask> {
    table.validate(minor)?;
    let wants_notify = interest.contains(SelectMask::NOTIFY);
    let ops = interest.remove(SelectMask::NOTIFY);
    let mut ready = SelectMask::NONE;

    if ops.contains(SelectMask::READ) {
        let listening_with_backlog = table
            .get(minor)
            .map(|s| s.listening && s.backlog.iter().any(|b| b.is_some()))
            .unwrap_or(false);
        let read_ready = listening_with_backlog || probe_read_ready(table, minor, copy);
        if read_ready {
            ready = ready.union(SelectMask::READ);
        }
    }

    if ops.contains(SelectMask::WRITE) {
        if probe_write_ready(table, minor, copy) {
            ready = ready.union(SelectMask::WRITE);
        }
    }

    if wants_notify {
        let unmet = ops.remove(ready);
        if let Some(slot) = table.get_mut(minor) {
            if unmet.is_empty() {
                slot.sel_ops = SelectMask::NONE;
            } else {
                slot.sel_endpt = sel_endpt;
                slot.sel_ops = unmet;
            }
        }
    }

    Ok(ready)
}

fn probe_read_ready<C: EndpointCopy>(table: &mut SocketTable, minor: SlotId, copy: &mut C) -> bool {
    struct Discard;
    impl ReplySink for Discard {
        fn task_reply(&mut self, _: Endpoint, _: crate::collab::RequestId, _: crate::collab::Reply) {}
        fn select_reply(&mut self, _: Endpoint, _: SlotId, _: SelectMask) {}
    }
    let mut discard = Discard;
    match perform_read(table, minor, Endpoint(0), crate::collab::Grant(0), 1, true, copy, &mut discard) {
        DataPathResult::Ready(n) => n > 0,
        DataPathResult::Blocked => false,
        DataPathResult::Err(_) => true,
    }
}

fn probe_write_ready<C: EndpointCopy>(table: &mut SocketTable, minor: SlotId, copy: &mut C) -> bool {
    struct Discard;
    impl ReplySink for Discard {
        fn task_reply(&mut self, _: Endpoint, _: crate::collab::RequestId, _: crate::collab::Reply) {}
        fn select_reply(&mut self, _: Endpoint, _: SlotId, _: SelectMask) {}
    }
    let mut discard = Discard;
    match perform_write(table, minor, Endpoint(0), crate::collab::Grant(0), 1, true, copy, &mut discard) {
        DataPathResult::Ready(n) => n > 0,
        DataPathResult::Blocked => false,
        DataPathResult::Err(_) => true,
    }
}

/// Fire `select_reply` for the intersection of `minor`'s registered
/// `sel_ops` and `mask`, then clear the delivered bits so the caller must
/// re-register — level-triggered, one notification per registration.
pub fn notify<S: ReplySink>(table: &mut SocketTable, minor: SlotId, mask: SelectMask, replies: &mut S) {
    let slot = match table.get_mut(minor) {
        Some(s) => s,
        None => return,
    };
    let fired = slot.sel_ops.union(SelectMask::NONE);
    let hit = SelectMask(fired.0 & mask.0);
    if hit.is_empty() {
        return;
    }
    let sel_endpt = slot.sel_endpt;
    slot.sel_ops = slot.sel_ops.remove(hit);
    replies.select_reply(sel_endpt, minor, hit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Grant, Reply, RequestId};
    use crate::table::{Mode, SockType};
    use alloc::vec::Vec;

    struct NoCopy;
    impl EndpointCopy for NoCopy {
        fn copy_out(&mut self, _e: Endpoint, _g: Grant, _o: usize, src: &[u8]) -> Result<usize> {
            Ok(src.len())
        }
        fn copy_in(&mut self, _e: Endpoint, _g: Grant, _o: usize, dst: &mut [u8]) -> Result<usize> {
            Ok(dst.len())
        }
    }

    #[derive(Default)]
    struct RecordReplies {
        selects: Vec<(Endpoint, SlotId, SelectMask)>,
    }
    impl ReplySink for RecordReplies {
        fn task_reply(&mut self, _endpt: Endpoint, _id: RequestId, _result: Reply) {}
        fn select_reply(&mut self, sel_endpt: Endpoint, minor: SlotId, ops: SelectMask) {
            self.selects.push((sel_endpt, minor, ops));
        }
    }

    #[test]
    fn write_is_immediately_ready_on_a_fresh_socket() {
        let mut table = SocketTable::new();
        let a = table.open(Endpoint(1)).unwrap();
        table.get_mut(a).unwrap().ty = SockType::Dgram;
        table.get_mut(a).unwrap().mode = Mode::RW;
        // Give it a target so perform_write's pretend probe can succeed.
        let b = table.open(Endpoint(2)).unwrap();
        table.get_mut(b).unwrap().ty = SockType::Dgram;
        table.get_mut(b).unwrap().addr = crate::table::Addr::from_bytes(b"/b");
        table.get_mut(a).unwrap().target = crate::table::Addr::from_bytes(b"/b");

        let mut copy = NoCopy;
        let mut replies = RecordReplies::default();
        let interest = SelectMask::READ.union(SelectMask::WRITE).union(SelectMask::NOTIFY);
        let ready = select(&mut table, a, interest, Endpoint(9), &mut copy, &mut replies).unwrap();
        assert_eq!(ready, SelectMask::WRITE);
        assert_eq!(table.get(a).unwrap().sel_ops, SelectMask::READ);
    }

    #[test]
    fn poll_without_notify_leaves_registration_untouched() {
        let mut table = SocketTable::new();
        let a = table.open(Endpoint(1)).unwrap();
        let b = table.open(Endpoint(2)).unwrap();
        table.get_mut(a).unwrap().ty = SockType::Stream;
        table.get_mut(b).unwrap().ty = SockType::Stream;
        // A live peer with its write half open makes the read probe block
        // rather than fail NotConnected, so READ stays unready here.
        table.get_mut(a).unwrap().peer = Some(b);
        table.get_mut(b).unwrap().peer = Some(a);
        table.get_mut(a).unwrap().sel_ops = SelectMask::WRITE;
        table.get_mut(a).unwrap().sel_endpt = Endpoint(42);

        let mut copy = NoCopy;
        let mut replies = RecordReplies::default();
        let ready = select(&mut table, a, SelectMask::READ, Endpoint(9), &mut copy, &mut replies).unwrap();

        assert!(ready.is_empty());
        // No NOTIFY bit was set: the pre-existing registration must survive
        // untouched, and this poll must not have overwritten it either.
        assert_eq!(table.get(a).unwrap().sel_ops, SelectMask::WRITE);
        assert_eq!(table.get(a).unwrap().sel_endpt, Endpoint(42));
    }

    #[test]
    fn notify_delivers_only_registered_bits_and_clears_them() {
        let mut table = SocketTable::new();
        let a = table.open(Endpoint(1)).unwrap();
        table.get_mut(a).unwrap().sel_ops = SelectMask::READ;
        table.get_mut(a).unwrap().sel_endpt = Endpoint(9);

        let mut replies = RecordReplies::default();
        notify(&mut table, a, SelectMask::READ.union(SelectMask::WRITE), &mut replies);

        assert_eq!(replies.selects.len(), 1);
        assert_eq!(replies.selects[0].2, SelectMask::READ);
        assert_eq!(table.get(a).unwrap().sel_ops, SelectMask::NONE);

        replies.selects.clear();
        notify(&mut table, a, SelectMask::READ, &mut replies);
        assert!(replies.selects.is_empty());
    }
}

//! End-to-end scenarios strung together from the public dispatcher entry
//! points. Each test plays both sides of a socket
//! pair by hand — there is no control decoder in this crate, so `bind`,
//! `connect`, and `accept`'s address-matching/backlog wiring are set up
//! directly on the table the way a real control collaborator would after
//! doing its own address bookkeeping.

use alloc::vec::Vec;

use crate::collab::{Endpoint, EndpointCopy, Grant, Reply, ReplySink, RequestId, SelectMask};
use crate::dispatch::{close, read, write, EntryOutcome};
use crate::error::UdsError;
use crate::table::{Addr, SockType, SocketTable, SuspendKind};
use crate::{NullLifecycle, RequestArgs};

/// Flat in-memory stand-in for the cross-endpoint safe-copy primitive: a
/// grant is just an offset into a byte buffer the test owns directly.
struct MemCopy {
    buf: Vec<u8>,
}

impl MemCopy {
    fn new(seed: &[u8]) -> Self {
        MemCopy { buf: seed.to_vec() }
    }

    fn contents(&self) -> &[u8] {
        &self.buf
    }
}

impl EndpointCopy for MemCopy {
    fn copy_out(&mut self, _e: Endpoint, _g: Grant, offset: usize, src: &[u8]) -> crate::Result<usize> {
        if offset + src.len() > self.buf.len() {
            self.buf.resize(offset + src.len(), 0);
        }
        self.buf[offset..offset + src.len()].copy_from_slice(src);
        Ok(src.len())
    }
    fn copy_in(&mut self, _e: Endpoint, _g: Grant, offset: usize, dst: &mut [u8]) -> crate::Result<usize> {
        let n = dst.len().min(self.buf.len().saturating_sub(offset));
        dst[..n].copy_from_slice(&self.buf[offset..offset + n]);
        Ok(n)
    }
}

#[derive(Default)]
struct RecordReplies {
    replies: Vec<(Endpoint, RequestId, Reply)>,
    selects: Vec<(Endpoint, crate::SlotId, SelectMask)>,
}

impl ReplySink for RecordReplies {
    fn task_reply(&mut self, endpt: Endpoint, id: RequestId, result: Reply) {
        self.replies.push((endpt, id, result));
    }
    fn select_reply(&mut self, sel_endpt: Endpoint, minor: crate::SlotId, ops: SelectMask) {
        self.selects.push((sel_endpt, minor, ops));
    }
}

fn args(endpt: u32, id: u64, size: usize, nonblock: bool) -> RequestArgs {
    RequestArgs {
        endpt: Endpoint(endpt),
        grant: Grant(0),
        size,
        nonblock,
        id: RequestId(id),
    }
}

/// Directly connect `a` (client) and `b` (server), bypassing the absent
/// control decoder: both slots' `peer` point at each other, the way a real
/// `connect`/`accept` handshake leaves them.
fn connect_pair(table: &mut SocketTable, ty: SockType) -> (crate::SlotId, crate::SlotId) {
    let a = table.open(Endpoint(1)).unwrap();
    let b = table.open(Endpoint(2)).unwrap();
    table.get_mut(a).unwrap().ty = ty;
    table.get_mut(b).unwrap().ty = ty;
    table.get_mut(a).unwrap().peer = Some(b);
    table.get_mut(b).unwrap().peer = Some(a);
    (a, b)
}

#[test]
fn stream_handshake_and_echo() {
    let mut table = SocketTable::new();
    let (client, server) = connect_pair(&mut table, SockType::Stream);

    let mut copy = MemCopy::new(b"hello");
    let mut replies = RecordReplies::default();
    let n = write(&mut table, client, args(1, 1, 5, false), &mut copy, &mut replies).unwrap();
    assert_eq!(n, EntryOutcome::Immediate(5));

    let mut out = MemCopy::new(&[]);
    let n = read(&mut table, server, args(2, 2, 10, false), &mut out, &mut replies).unwrap();
    assert_eq!(n, EntryOutcome::Immediate(5));
    assert_eq!(out.contents(), b"hello");

    let mut copy = MemCopy::new(b"world");
    let n = write(&mut table, server, args(2, 3, 5, false), &mut copy, &mut replies).unwrap();
    assert_eq!(n, EntryOutcome::Immediate(5));

    let mut out = MemCopy::new(&[]);
    let n = read(&mut table, client, args(1, 4, 10, false), &mut out, &mut replies).unwrap();
    assert_eq!(n, EntryOutcome::Immediate(5));
    assert_eq!(out.contents(), b"world");

    let mut lifecycle = NullLifecycle;
    let mut nop = MemCopy::new(&[]);
    close(&mut table, client, &mut nop, &mut lifecycle, &mut replies, &mut crate::collab::NullLog).unwrap();
    close(&mut table, server, &mut nop, &mut lifecycle, &mut replies, &mut crate::collab::NullLog).unwrap();
    assert!(table.iter_inuse().next().is_none());
}

#[test]
fn blocked_reader_wakes_on_write() {
    let mut table = SocketTable::new();
    let (client, server) = connect_pair(&mut table, SockType::Stream);

    let mut copy = MemCopy::new(&[]);
    let mut replies = RecordReplies::default();
    let outcome = read(&mut table, client, args(1, 10, 4, false), &mut copy, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Deferred);
    assert_eq!(table.get(client).unwrap().suspended, SuspendKind::Read);

    let mut abcd = MemCopy::new(b"abcd");
    write(&mut table, server, args(2, 11, 4, false), &mut abcd, &mut replies).unwrap();

    assert_eq!(replies.replies.len(), 1);
    assert_eq!(replies.replies[0].2, Reply::Ok(4));
    assert_eq!(table.get(client).unwrap().suspended, SuspendKind::None);
}

#[test]
fn blocked_writer_wakes_on_drain() {
    let mut table = SocketTable::new();
    let (client, server) = connect_pair(&mut table, SockType::Stream);

    let filler = alloc::vec![0xABu8; crate::BUF_CAP];
    let mut copy = MemCopy::new(&filler);
    let mut replies = RecordReplies::default();
    let outcome = write(&mut table, client, args(1, 1, crate::BUF_CAP, false), &mut copy, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(crate::BUF_CAP));

    let mut one_more = MemCopy::new(&[0xFF]);
    let outcome = write(&mut table, client, args(1, 2, 1, false), &mut one_more, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Deferred);
    assert_eq!(table.get(client).unwrap().suspended, SuspendKind::Write);

    let mut drained = MemCopy::new(&[]);
    let outcome = read(&mut table, server, args(2, 3, 1, false), &mut drained, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(1));

    assert_eq!(replies.replies.len(), 1);
    assert_eq!(replies.replies[0].2, Reply::Ok(1));
    assert_eq!(table.get(client).unwrap().suspended, SuspendKind::None);
}

#[test]
fn connection_reset_on_close() {
    let mut table = SocketTable::new();
    let (client, server) = connect_pair(&mut table, SockType::Stream);

    let mut copy = MemCopy::new(&[]);
    let mut lifecycle = NullLifecycle;
    let mut replies = RecordReplies::default();
    close(&mut table, client, &mut copy, &mut lifecycle, &mut replies, &mut crate::collab::NullLog).unwrap();

    let mut out = MemCopy::new(&[]);
    let err = read(&mut table, server, args(2, 1, 4, false), &mut out, &mut replies).unwrap_err();
    assert_eq!(err, UdsError::ConnectionReset);

    let err = read(&mut table, server, args(2, 2, 4, false), &mut out, &mut replies).unwrap_err();
    assert_eq!(err, UdsError::NotConnected);
}

#[test]
fn datagram_delivery_and_drop() {
    let mut table = SocketTable::new();
    let a = table.open(Endpoint(1)).unwrap();
    let b = table.open(Endpoint(2)).unwrap();
    table.get_mut(a).unwrap().ty = SockType::Dgram;
    table.get_mut(b).unwrap().ty = SockType::Dgram;
    table.get_mut(a).unwrap().addr = Addr::from_bytes(b"/x");
    table.get_mut(b).unwrap().addr = Addr::from_bytes(b"/y");
    table.get_mut(a).unwrap().target = Addr::from_bytes(b"/y");

    let mut replies = RecordReplies::default();
    let mut p1 = MemCopy::new(b"p1");
    let outcome = write(&mut table, a, args(1, 1, 2, false), &mut p1, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(2));

    let mut out = MemCopy::new(&[]);
    let outcome = read(&mut table, b, args(2, 2, 2, false), &mut out, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(2));
    assert_eq!(out.contents(), b"p1");
    assert_eq!(table.get(b).unwrap().source, Addr::from_bytes(b"/x"));

    // Buffer is empty again: p2 is queued, p3 arrives before B reads it and
    // is silently dropped (write still reports success).
    let mut p2 = MemCopy::new(b"p2");
    write(&mut table, a, args(1, 3, 2, false), &mut p2, &mut replies).unwrap();
    let mut p3 = MemCopy::new(b"p3");
    let outcome = write(&mut table, a, args(1, 4, 2, false), &mut p3, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(2));

    let mut out2 = MemCopy::new(&[]);
    let outcome = read(&mut table, b, args(2, 5, 2, false), &mut out2, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(2));
    assert_eq!(out2.contents(), b"p2");
}

#[test]
fn nonblocking_read_returns_again() {
    let mut table = SocketTable::new();
    let (client, _server) = connect_pair(&mut table, SockType::Stream);

    let mut copy = MemCopy::new(&[]);
    let mut replies = RecordReplies::default();
    let err = read(&mut table, client, args(1, 1, 4, true), &mut copy, &mut replies).unwrap_err();
    assert_eq!(err, UdsError::Again);
    assert_eq!(table.get(client).unwrap().suspended, SuspendKind::None);
}

#[test]
fn select_with_notify_fires_on_write() {
    let mut table = SocketTable::new();
    let (client, server) = connect_pair(&mut table, SockType::Stream);

    let mut copy = MemCopy::new(&[]);
    let mut replies = RecordReplies::default();
    let interest = SelectMask::READ.union(SelectMask::NOTIFY);
    let ready = crate::dispatch::select(&mut table, client, interest, Endpoint(9), &mut copy, &mut replies).unwrap();
    assert!(ready.is_empty());
    assert_eq!(table.get(client).unwrap().sel_ops, SelectMask::READ);

    let mut payload = MemCopy::new(&[0x01]);
    write(&mut table, server, args(2, 1, 1, false), &mut payload, &mut replies).unwrap();

    assert_eq!(replies.selects.len(), 1);
    assert_eq!(replies.selects[0].2, SelectMask::READ);
    assert_eq!(table.get(client).unwrap().sel_ops, SelectMask::NONE);
}

#[test]
fn seqpacket_atomicity() {
    let mut table = SocketTable::new();
    let (a, b) = connect_pair(&mut table, SockType::Seqpacket);

    let mut too_big = MemCopy::new(&alloc::vec![0u8; crate::BUF_CAP + 1]);
    let mut replies = RecordReplies::default();
    let err = write(&mut table, a, args(1, 1, crate::BUF_CAP + 1, false), &mut too_big, &mut replies).unwrap_err();
    assert_eq!(err, UdsError::MessageSize);

    let mut full = MemCopy::new(&alloc::vec![0xAAu8; crate::BUF_CAP]);
    let outcome = write(&mut table, a, args(1, 2, crate::BUF_CAP, false), &mut full, &mut replies).unwrap();
    assert_eq!(outcome, EntryOutcome::Immediate(crate::BUF_CAP));

    let mut second = MemCopy::new(&[0xBB]);
    let err = write(&mut table, a, args(1, 3, 1, true), &mut second, &mut replies).unwrap_err();
    assert_eq!(err, UdsError::Again);
    let _ = b;
}

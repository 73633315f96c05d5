//! Dispatcher glue: the seven character-device entry points
//! and the `close`/`reset` lifecycle.
//!
//! Everything here is thin plumbing over `table`/`ring`/`datapath`/
//! `suspend`/`select` — the same "dispatcher validates and threads, the
//! component owns the logic" split the kernel draws between
//! `syscall::handlers::ipc` and `ipc::anon_pipe` itself.

use crate::collab::{
    Endpoint, EndpointCopy, LifecycleHooks, LogLevel, LogSink, Reply, ReplySink, RequestArgs,
    SelectMask,
};
use crate::datapath::{perform_read, perform_write, DataPathResult};
use crate::error::{Result, UdsError};
use crate::table::{Mode, SlotId, SocketTable, SuspendKind};

/// Result of a dispatcher entry point: either the operation completed
/// synchronously, or it parked and the caller (the character-device
/// harness) must not reply yet — the deferred reply arrives later via
/// [`crate::collab::ReplySink::task_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Immediate(usize),
    Deferred,
}

/// `open()`: claim a slot and hand back its minor.
pub fn open(table: &mut SocketTable, owner: Endpoint) -> Result<SlotId> {
    table.open(owner)
}

/// `read()`: drive `perform_read`, and on a blocking
/// result either park (blocking) or convert straight to `EAGAIN`
/// (non-blocking) via the same "park, then immediately cancel" shape used
/// for every suspension point.
pub fn read<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    args: RequestArgs,
    copy: &mut C,
    replies: &mut S,
) -> Result<EntryOutcome> {
    table.validate(minor)?;
    match perform_read(table, minor, args.endpt, args.grant, args.size, false, copy, replies) {
        DataPathResult::Ready(n) => Ok(EntryOutcome::Immediate(n)),
        DataPathResult::Err(e) => Err(e),
        DataPathResult::Blocked => park_or_nonblock(table, minor, SuspendKind::Read, args),
    }
}

/// `write()`: symmetric to [`read`].
pub fn write<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    args: RequestArgs,
    copy: &mut C,
    replies: &mut S,
) -> Result<EntryOutcome> {
    table.validate(minor)?;
    match perform_write(table, minor, args.endpt, args.grant, args.size, false, copy, replies) {
        DataPathResult::Ready(n) => Ok(EntryOutcome::Immediate(n)),
        DataPathResult::Err(e) => Err(e),
        DataPathResult::Blocked => park_or_nonblock(table, minor, SuspendKind::Write, args),
    }
}

/// `ioctl`'s suspension hook: the control collaborator has
/// already decided the request must park as `Connect` or `Accept` (having
/// set up `child`/`backlog` linkage itself) and calls this to record the
/// suspension the same way `read`/`write` do. Any other `kind` is a
/// programming error in the caller.
pub fn suspend_for_control(
    table: &mut SocketTable,
    minor: SlotId,
    kind: SuspendKind,
    args: RequestArgs,
) -> Result<EntryOutcome> {
    debug_assert!(
        matches!(kind, SuspendKind::Connect | SuspendKind::Accept),
        "bug: suspend_for_control called with a non-control suspension kind"
    );
    table.validate(minor)?;
    park_or_nonblock(table, minor, kind, args)
}

/// Park `minor` on `kind`, then, if `args.nonblock`, immediately unpark it
/// and translate the request straight to the caller-facing non-blocking
/// error: `Connect` →
/// `EINPROGRESS`, everything else → `EAGAIN`. No other caller could have
/// raced to observe or cancel a request this entry point hasn't returned
/// from yet, so the translation happens inline rather than through a real
/// `cancel` + `task_reply` round-trip.
fn park_or_nonblock(
    table: &mut SocketTable,
    minor: SlotId,
    kind: SuspendKind,
    args: RequestArgs,
) -> Result<EntryOutcome> {
    crate::suspend::park(table, minor, kind, args.endpt, args.grant, args.size, args.id);
    if !args.nonblock {
        return Ok(EntryOutcome::Deferred);
    }
    if let Some(slot) = table.get_mut(minor) {
        slot.suspended = SuspendKind::None;
    }
    Err(if matches!(kind, SuspendKind::Connect) {
        UdsError::InProgress
    } else {
        UdsError::Again
    })
}

/// `cancel()`.
pub fn cancel<S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    endpt: Endpoint,
    id: crate::collab::RequestId,
    replies: &mut S,
) -> Result<()> {
    crate::suspend::cancel(table, minor, endpt, id, replies)
}

/// `select()`.
pub fn select<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    interest: SelectMask,
    sel_endpt: Endpoint,
    copy: &mut C,
    replies: &mut S,
) -> Result<SelectMask> {
    crate::select::select(table, minor, interest, sel_endpt, copy, replies)
}

/// `begin_shutdown()`: the `SIGTERM` entry point. Arms `exit_left`
/// sequencing on the table; if the table is already empty, fires
/// [`LifecycleHooks::terminate`] immediately rather than waiting for a
/// `close` that will never come.
pub fn begin_shutdown<L: LifecycleHooks>(table: &mut SocketTable, lifecycle: &mut L) {
    if table.begin_shutdown() == 0 {
        lifecycle.terminate();
    }
}

/// `close()`: detach `minor` from its peer/backlog/listening
/// graph, release passed-FDs and the ring, and zero the slot. If a
/// shutdown is in progress ([`begin_shutdown`]) and this was the last
/// `INUSE` slot, invokes [`LifecycleHooks::terminate`].
pub fn close<C: EndpointCopy, L: LifecycleHooks, S: ReplySink, G: LogSink>(
    table: &mut SocketTable,
    minor: SlotId,
    copy: &mut C,
    lifecycle: &mut L,
    replies: &mut S,
    log: &mut G,
) -> Result<()> {
    table.validate(minor)?;
    let peer = table.get(minor).unwrap().peer;
    let listening = table.get(minor).unwrap().listening;

    match peer {
        Some(peer_id) => {
            let peer_is_listener = table.get(peer_id).map(|p| p.peer.is_none()).unwrap_or(false);
            if peer_is_listener {
                assert!(
                    table.get(peer_id).map(|p| p.listening).unwrap_or(false),
                    "bug: a connecting slot's peer must be listening"
                );
                if let Some(p) = table.get_mut(peer_id) {
                    for slot in p.backlog.iter_mut() {
                        if *slot == Some(minor) {
                            *slot = None;
                        }
                    }
                }
            } else {
                crate::log!(log, LogLevel::Warn, "close: resetting connected peer of slot {}", minor.0);
                reset(table, peer_id, copy, replies);
            }
        }
        None => {
            if listening {
                let backlog = table.get(minor).unwrap().backlog;
                for entry in backlog.iter().flatten() {
                    crate::log!(log, LogLevel::Warn, "close: resetting backlog entry of listener {}", minor.0);
                    reset(table, *entry, copy, replies);
                }
            }
        }
    }

    let tokens = core::mem::take(&mut table.get_mut(minor).unwrap().ancillary);
    if !tokens.is_empty() {
        lifecycle.release_ancillary(&tokens);
    }

    table.release(minor);
    crate::log!(log, LogLevel::Debug, "close: released slot {}", minor.0);
    if table.note_close() {
        crate::log!(log, LogLevel::Info, "close: exit_left drained, terminating");
        lifecycle.terminate();
    }
    Ok(())
}

/// `reset()`: tear down the far side of a pair being closed.
/// Stamps the one-shot `ConnectionReset` error and replays whatever the slot
/// was parked on through the ordinary [`crate::suspend::unsuspend`] path —
/// a `Read`/`Write` replay now sees `peer == NONE` with `err` set and
/// resolves to `ConnectionReset` through the same step 3 branch a fresh
/// call would take, so there is no separate reset-specific reply rule to
/// get right here. Also fires any pending select notification.
fn reset<C: EndpointCopy, S: ReplySink>(table: &mut SocketTable, minor: SlotId, copy: &mut C, replies: &mut S) {
    let slot = match table.get_mut(minor) {
        Some(s) => s,
        None => return,
    };
    slot.peer = None;
    slot.err = Some(UdsError::ConnectionReset);

    if slot.suspended != SuspendKind::None {
        crate::suspend::unsuspend(table, minor, copy, replies);
    }

    let sel_ops = table.get(minor).map(|s| s.sel_ops).unwrap_or(SelectMask::NONE);
    if !sel_ops.is_empty() {
        let sel_endpt = table.get(minor).unwrap().sel_endpt;
        table.get_mut(minor).unwrap().sel_ops = SelectMask::NONE;
        replies.select_reply(sel_endpt, minor, sel_ops);
    }
}

/// `shutdown()`: clear `how` from `minor`'s `mode`, then, since a half-close can make a
/// peer's pending read or write newly resolvable, re-run its suspension the
/// same way a real read/write would wake it — `shutdown(SHUT_WR)` makes a
/// peer parked on read see EOF exactly as it would after this side stopped
/// writing, and `shutdown(SHUT_RD)` makes a peer parked on write see
/// `EPIPE` exactly as it would after this side's read half closed.
pub fn shutdown<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    how: Mode,
    copy: &mut C,
    replies: &mut S,
) -> Result<()> {
    table.shutdown(minor, how)?;
    if let Some(peer_id) = table.get(minor).and_then(|s| s.peer) {
        let peer_suspended = table.get(peer_id).map(|p| p.suspended != SuspendKind::None).unwrap_or(false);
        if peer_suspended {
            crate::suspend::unsuspend(table, peer_id, copy, replies);
        }
        let peer_sel_ops = table.get(peer_id).map(|p| p.sel_ops).unwrap_or(SelectMask::NONE);
        if how.has(Mode::W) && peer_sel_ops.contains(SelectMask::READ) {
            crate::select::notify(table, peer_id, SelectMask::READ, replies);
        }
        if how.has(Mode::R) && peer_sel_ops.contains(SelectMask::WRITE) {
            crate::select::notify(table, peer_id, SelectMask::WRITE, replies);
        }
    }
    Ok(())
}

//! Suspension: parking a request on a slot, and replaying it on wakeup or
//! cancel.
//!
//! `SuspendKind` itself carries no payload — the
//! parked request's parameters live in the slot's `susp_*` fields. Replay
//! re-runs the same `perform_read`/`perform_write` decision tree used for the
//! original call rather than a separate "resume" code path, the way
//! `ipc::anon_pipe`'s blocked readers are woken by re-driving the same read
//! routine instead of a bespoke continuation.

use crate::collab::{Endpoint, EndpointCopy, Reply, ReplySink, RequestId};
use crate::datapath::{perform_read, perform_write, DataPathResult};
use crate::error::{Result, UdsError};
use crate::table::{SlotId, SocketTable, SuspendKind};

/// Park `minor` on `kind`, stashing the request's parameters for replay.
/// Callers must first have observed `perform_read`/`perform_write` (or the
/// connect/accept control path) return "would block".
pub fn park(
    table: &mut SocketTable,
    minor: SlotId,
    kind: SuspendKind,
    endpt: Endpoint,
    grant: crate::collab::Grant,
    size: usize,
    id: RequestId,
) {
    if let Some(slot) = table.get_mut(minor) {
        slot.suspended = kind;
        slot.susp_endpt = endpt;
        slot.susp_grant = grant;
        slot.susp_size = size;
        slot.susp_id = id;
    }
}

/// Replay `minor`'s parked request, called after a wakeup condition fires
/// (buffer drained/filled, connect completed, backlog gained an entry).
///
/// A `Read`/`Write` replay that blocks again simply leaves the slot parked
/// exactly as it was — there is nothing to undo, since the
/// slot's `susp_*` fields already hold the original request. `Connect` and
/// `Accept` replay by delivering whatever the control collaborator already
/// staged in `slot.err` (`None` meaning success), then clearing suspension
/// unconditionally, since those two never re-park on the same wakeup.
pub fn unsuspend<C: EndpointCopy, S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    copy: &mut C,
    replies: &mut S,
) {
    let slot = match table.get(minor) {
        Some(s) => s,
        None => return,
    };
    let kind = slot.suspended;
    let endpt = slot.susp_endpt;
    let grant = slot.susp_grant;
    let size = slot.susp_size;
    let id = slot.susp_id;

    match kind {
        SuspendKind::None => {}
        SuspendKind::Read => {
            match perform_read(table, minor, endpt, grant, size, false, copy, replies) {
                DataPathResult::Blocked => {}
                DataPathResult::Ready(n) => {
                    clear(table, minor);
                    replies.task_reply(endpt, id, Reply::Ok(n));
                }
                DataPathResult::Err(e) => {
                    clear(table, minor);
                    replies.task_reply(endpt, id, Reply::Err(e));
                }
            }
        }
        SuspendKind::Write => {
            match perform_write(table, minor, endpt, grant, size, false, copy, replies) {
                DataPathResult::Blocked => {}
                DataPathResult::Ready(n) => {
                    clear(table, minor);
                    replies.task_reply(endpt, id, Reply::Ok(n));
                }
                DataPathResult::Err(e) => {
                    clear(table, minor);
                    replies.task_reply(endpt, id, Reply::Err(e));
                }
            }
        }
        SuspendKind::Connect | SuspendKind::Accept => {
            let err = table.get_mut(minor).map(|s| s.err.take()).unwrap_or(None);
            clear(table, minor);
            match err {
                None => replies.task_reply(endpt, id, Reply::Ok(0)),
                Some(e) => replies.task_reply(endpt, id, Reply::Err(e)),
            }
        }
    }
}

/// Interrupt a parked request: validates the `(endpt, id)`
/// pair against the stored suspension so a stale/racing cancel is a benign
/// no-op, clears the suspension, and replies `EINTR`.
///
/// An `Accept` cancel also releases the child slot reserved for the
/// not-yet-completed connector: the reserved slot carries `child == minor`
/// pointing back at the listener it is reserved for, so the
/// release is a table scan for that back-pointer, not a lookup through a
/// field on `minor` itself.
pub fn cancel<S: ReplySink>(
    table: &mut SocketTable,
    minor: SlotId,
    endpt: Endpoint,
    id: RequestId,
    replies: &mut S,
) -> Result<()> {
    let slot = table.validate(minor)?;
    if slot.suspended == SuspendKind::None || slot.susp_endpt != endpt || slot.susp_id != id {
        return Ok(());
    }
    let kind = slot.suspended;

    if kind == SuspendKind::Accept {
        if let Some(reserved) = table
            .iter_inuse()
            .find(|(slot_id, s)| *slot_id != minor && s.child == Some(minor))
            .map(|(slot_id, _)| slot_id)
        {
            if let Some(reserved_slot) = table.get_mut(reserved) {
                reserved_slot.child = None;
            }
        }
    }

    clear(table, minor);
    replies.task_reply(endpt, id, Reply::Err(UdsError::Interrupted));
    Ok(())
}

fn clear(table: &mut SocketTable, minor: SlotId) {
    if let Some(slot) = table.get_mut(minor) {
        slot.suspended = SuspendKind::None;
    }
}

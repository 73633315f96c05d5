//! The socket table: a fixed-size array of socket slots, indexed by minor
//! number.
//!
//! Peer and backlog relationships form a cyclic, mutable graph; this module never hands out owning
//! references into the table, only `SlotId` indices, the same discipline
//! `ipc::anon_pipe` and `fs::fd_table::FdTable` use for their own
//! fixed-size tables — lookups always re-enter the array by index rather
//! than caching a pointer across a call.

use alloc::vec::Vec;

use crate::collab::{Endpoint, Grant, RequestId, SelectMask, SlotId};
use crate::error::{Result, UdsError};
use crate::ring::Ring;

/// `N`: table size. Slot `0` is reserved for the device node itself and is
/// never handed out by `open`.
pub const N: usize = 64;
/// `BUF_CAP`: ring size, one per socket. Matches the kernel's
/// `ipc::anon_pipe::PIPE_BUF_SIZE`.
pub const BUF_CAP: usize = 4096;
/// `SOMAXCONN`: backlog length.
pub const SOMAXCONN: usize = 16;
/// `PATH_MAX`: datagram address match length (traditional `sockaddr_un`
/// path length).
pub const PATH_MAX: usize = 108;
/// `OPEN_MAX`: ancillary FD slots per pending send.
pub const OPEN_MAX: usize = 16;

/// `FREE` or `INUSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    InUse,
}

/// Socket type, fixed once at bind/connect time by the control collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockType {
    Unset,
    Stream,
    Seqpacket,
    Dgram,
}

/// Bitset of halves not yet shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode(pub u8);

impl Mode {
    pub const R: Mode = Mode(0b01);
    pub const W: Mode = Mode(0b10);
    pub const NONE: Mode = Mode(0);
    pub const RW: Mode = Mode(0b11);

    pub fn has(self, bit: Mode) -> bool {
        self.0 & bit.0 == bit.0
    }
    pub fn clear(&mut self, bit: Mode) {
        self.0 &= !bit.0;
    }
}

/// `suspended`'s tagged state: a payload-free sum type. The parked request's parameters live in the slot's
/// fixed `susp_*` fields, not inside this enum, so illegal
/// kind/payload combinations are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendKind {
    None,
    Read,
    Write,
    Connect,
    Accept,
}

/// A bound/source/target address: a bounded byte buffer, no heap string,
/// matching the fixed `[u8; MAX_PIPE_NAME]` + `name_len` shape of
/// `ipc::pipe::Pipe`.
#[derive(Debug, Clone, Copy)]
pub struct Addr {
    path: [u8; PATH_MAX],
    len: usize,
}

impl Addr {
    pub const EMPTY: Addr = Addr {
        path: [0; PATH_MAX],
        len: 0,
    };

    pub fn from_bytes(bytes: &[u8]) -> Addr {
        let mut path = [0u8; PATH_MAX];
        let len = bytes.len().min(PATH_MAX);
        path[..len].copy_from_slice(&bytes[..len]);
        Addr { path, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.path[..self.len]
    }

    pub fn is_bound(&self) -> bool {
        self.len > 0
    }

    /// `strncmp`-style comparison over `PATH_MAX`.
    pub fn matches(&self, other: &Addr) -> bool {
        self.is_bound() && other.is_bound() && self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq for Addr {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for Addr {}

/// One entry in the socket table.
pub struct SocketSlot {
    pub state: SlotState,
    pub owner: Endpoint,
    pub ty: SockType,
    pub mode: Mode,
    pub ring: Option<Ring>,
    /// Index of connected/connecting peer, or `None`.
    pub peer: Option<SlotId>,
    pub listening: bool,
    pub backlog: [Option<SlotId>; SOMAXCONN],
    /// Slot reserved by `accept` for a pending connector.
    pub child: Option<SlotId>,
    pub addr: Addr,
    pub source: Addr,
    pub target: Addr,
    /// Deferred error to deliver on the next read/write.
    pub err: Option<UdsError>,
    /// Staged passed-FD tokens for the next datagram/seqpacket send. The
    /// core never interprets these, it only holds and releases them
    /// (ancillary FD semantics belong to the control collaborator).
    pub ancillary: Vec<u32>,
    pub suspended: SuspendKind,
    pub susp_endpt: Endpoint,
    pub susp_grant: Grant,
    pub susp_size: usize,
    pub susp_id: RequestId,
    pub sel_endpt: Endpoint,
    pub sel_ops: SelectMask,
}

impl SocketSlot {
    pub const FREE: SocketSlot = SocketSlot {
        state: SlotState::Free,
        owner: Endpoint(0),
        ty: SockType::Unset,
        mode: Mode::NONE,
        ring: None,
        peer: None,
        listening: false,
        backlog: [None; SOMAXCONN],
        child: None,
        addr: Addr::EMPTY,
        source: Addr::EMPTY,
        target: Addr::EMPTY,
        err: None,
        ancillary: Vec::new(),
        suspended: SuspendKind::None,
        susp_endpt: Endpoint(0),
        susp_grant: Grant(0),
        susp_size: 0,
        susp_id: RequestId(0),
        sel_endpt: Endpoint(0),
        sel_ops: SelectMask::NONE,
    };

    pub fn is_free(&self) -> bool {
        matches!(self.state, SlotState::Free)
    }
}

/// Fixed-size table of socket slots. No heap allocation for the table
/// itself — one `Ring` is allocated per slot on `open` and freed on
/// `close`, the same split `fs::fd_table::FdTable` draws between its own
/// fixed array and the heap resources a slot may separately own.
pub struct SocketTable {
    slots: [SocketSlot; N],
    /// Remaining `INUSE` slots to drain before the dispatcher's terminate
    /// hook fires, per spec.md §6's `SIGTERM` lifecycle. Only meaningful
    /// while `shutting_down` is set.
    exit_left: usize,
    shutting_down: bool,
}

impl SocketTable {
    pub const fn new() -> Self {
        SocketTable {
            slots: [SocketSlot::FREE; N],
            exit_left: 0,
            shutting_down: false,
        }
    }

    /// `SIGTERM` entry: snapshot the number of `INUSE` slots into
    /// `exit_left` and arm shutdown sequencing. Returns the snapshot so the
    /// caller can fire the terminate hook immediately if the table is
    /// already empty.
    pub fn begin_shutdown(&mut self) -> usize {
        let count = self.iter_inuse().count();
        self.exit_left = count;
        self.shutting_down = true;
        count
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Called by `close()` once a slot has been released. Decrements
    /// `exit_left` while a shutdown is in progress and returns `true`
    /// exactly once, the call that drains it to zero — the caller's signal
    /// to invoke [`LifecycleHooks::terminate`](crate::collab::LifecycleHooks::terminate).
    pub fn note_close(&mut self) -> bool {
        if !self.shutting_down {
            return false;
        }
        self.exit_left = self.exit_left.saturating_sub(1);
        if self.exit_left == 0 {
            self.shutting_down = false;
            return true;
        }
        false
    }

    pub fn get(&self, id: SlotId) -> Option<&SocketSlot> {
        self.slots.get(id.0)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut SocketSlot> {
        self.slots.get_mut(id.0)
    }

    /// Validate the minor and that it is in use, returning the usual
    /// `NoSuchDevice`/`InvalidArgument` pair.
    pub fn validate(&self, id: SlotId) -> Result<&SocketSlot> {
        let slot = self.slots.get(id.0).ok_or(UdsError::NoSuchDevice)?;
        if slot.is_free() {
            return Err(UdsError::InvalidArgument);
        }
        Ok(slot)
    }

    pub fn validate_mut(&mut self, id: SlotId) -> Result<&mut SocketSlot> {
        let slot = self.slots.get_mut(id.0).ok_or(UdsError::NoSuchDevice)?;
        if slot.is_free() {
            return Err(UdsError::InvalidArgument);
        }
        Ok(slot)
    }

    /// Claim the first `FREE` slot in `[1, N)`, allocate its ring, and
    /// initialise it to the `open()` defaults. Slot `0` is
    /// reserved for the device node and is never scanned.
    pub fn open(&mut self, owner: Endpoint) -> Result<SlotId> {
        for i in 1..N {
            if self.slots[i].is_free() {
                self.slots[i] = SocketSlot {
                    state: SlotState::InUse,
                    owner,
                    mode: Mode::RW,
                    ring: Some(Ring::new(BUF_CAP)),
                    ..SocketSlot::FREE
                };
                return Ok(SlotId(i));
            }
        }
        Err(UdsError::NoFile)
    }

    /// Zero a slot back to `FREE`, dropping its ring and any staged
    /// ancillary tokens. Callers (the dispatcher's `close`) must have
    /// already detached the slot from any peer/backlog/listening graph —
    /// this call never touches other slots.
    pub fn release(&mut self, id: SlotId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = SocketSlot::FREE;
        }
    }

    /// Clear the given half(s) of `minor`'s `mode` bitset (supplemented
    /// feature: `shutdown`'s core-owned half). This is the pure bit
    /// mutation only — the wakeup this implies for a peer parked on the
    /// half just closed is the dispatcher's job
    /// ([`dispatch::shutdown`](crate::dispatch::shutdown)), the same split
    /// `close`/`reset` draws between table bookkeeping and wakeup
    /// propagation.
    pub fn shutdown(&mut self, minor: SlotId, how: Mode) -> Result<()> {
        let slot = self.validate_mut(minor)?;
        slot.mode.clear(how);
        Ok(())
    }

    /// Read-only snapshot of occupied slots, for diagnostics (grounded on
    /// `ipc::pipe::list()` / `sys_pipe_list`). No wire format is defined
    /// here — that belongs to the control collaborator.
    pub fn iter_inuse(&self) -> impl Iterator<Item = (SlotId, &SocketSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_free())
            .map(|(i, s)| (SlotId(i), s))
    }

    /// `SOCKADDR_UN` lookup used by `DGRAM` sends:
    /// first slot of type `Dgram` whose bound address matches `target`.
    /// O(N) linear scan; "first match wins" ordering is
    /// preserved by scanning low-to-high.
    pub fn find_dgram_by_addr(&self, target: &Addr) -> Option<SlotId> {
        for i in 1..N {
            let slot = &self.slots[i];
            if slot.is_free() {
                continue;
            }
            if matches!(slot.ty, SockType::Dgram) && slot.addr.matches(target) {
                return Some(SlotId(i));
            }
        }
        None
    }
}

impl Default for SocketTable {
    fn default() -> Self {
        SocketTable::new()
    }
}

/// Process-wide handle to a single [`SocketTable`], guarded by
/// [`crate::sync::Spinlock`] for embedders whose dispatch harness calls in
/// from more than one CPU. A purely single-threaded embedder can
/// skip this and own a bare `SocketTable` directly — every method above takes
/// `&mut self` with no internal locking of its own — but a static instance of
/// this type, initialised once at startup the way the kernel initialises
/// `static PIPES: Spinlock<...>`, is the common case.
pub struct SocketTableHandle(crate::sync::Spinlock<SocketTable>);

impl SocketTableHandle {
    pub const fn new() -> Self {
        SocketTableHandle(crate::sync::Spinlock::new(SocketTable::new()))
    }

    pub fn lock(&self) -> crate::sync::SpinlockGuard<'_, SocketTable> {
        self.0.lock()
    }
}

impl Default for SocketTableHandle {
    fn default() -> Self {
        SocketTableHandle::new()
    }
}

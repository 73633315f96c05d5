//! Hooks the out-of-scope collaborators plug into.
//!
//! The character-device dispatch harness, the cross-endpoint safe-copy
//! primitive, and the logging sink all live outside this crate. Rather than hard-wire a concrete transport, each is pinned here as
//! a small trait — the same shape `libcorevm::io::IoHandler` and
//! `libcorevm::memory::MemoryBus` use to keep a core state machine
//! testable without the real hardware/kernel underneath it.

use crate::error::Result;

/// Opaque identity of the process/thread that issued a request. The core
/// never interprets this beyond equality comparison, exactly as
/// `ipc::anon_pipe` stores raw `tid: u32` values it never looks inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Endpoint(pub u32);

/// Opaque capability naming a user-side buffer; paired with a byte length
/// on each call. The grant's internal shape belongs to the copy primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grant(pub u64);

/// Correlates a parked request with the `cancel` call that may unwind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestId(pub u64);

/// Index into the socket table, handed back to the dispatcher as the minor
/// number of a freshly opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub usize);

/// The cross-endpoint safe-copy primitive: moves bytes
/// between a ring buffer and a caller-supplied `(Endpoint, Grant)` pair.
/// Copy failures are propagated verbatim.
pub trait EndpointCopy {
    /// Copy `src` into the caller's buffer named by `(endpt, grant)`,
    /// starting `offset` bytes into the grant (a ring drain that wraps
    /// issues this twice, once per contiguous segment).
    /// Returns the number of bytes actually copied.
    fn copy_out(
        &mut self,
        endpt: Endpoint,
        grant: Grant,
        offset: usize,
        src: &[u8],
    ) -> Result<usize>;

    /// Copy from the caller's buffer named by `(endpt, grant)` into `dst`,
    /// starting `offset` bytes into the grant.
    /// Returns the number of bytes actually copied.
    fn copy_in(
        &mut self,
        endpt: Endpoint,
        grant: Grant,
        offset: usize,
        dst: &mut [u8],
    ) -> Result<usize>;
}

/// Outcome of a deferred (suspended) request, delivered via
/// [`ReplySink::task_reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The operation completed, yielding this many bytes (read/write) or
    /// this status (connect/accept, where the count is meaningless and
    /// always reported as 0).
    Ok(usize),
    /// The operation failed with this error.
    Err(crate::error::UdsError),
}

/// Bitset of readiness conditions used by both the immediate and the
/// notified halves of select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectMask(pub u8);

impl SelectMask {
    pub const READ: SelectMask = SelectMask(0b0001);
    pub const WRITE: SelectMask = SelectMask(0b0010);
    pub const ERR: SelectMask = SelectMask(0b0100);
    /// Requests future notification for whichever of `READ`/`WRITE`/`ERR`
    /// are not immediately satisfiable. Never itself reported
    /// back as a "ready" bit.
    pub const NOTIFY: SelectMask = SelectMask(0b1000);
    pub const NONE: SelectMask = SelectMask(0);

    pub fn contains(self, other: SelectMask) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn union(self, other: SelectMask) -> SelectMask {
        SelectMask(self.0 | other.0)
    }
    pub fn remove(self, other: SelectMask) -> SelectMask {
        SelectMask(self.0 & !other.0)
    }
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The dispatcher-facing reply channels: deferred task
/// completion and asynchronous select notification.
pub trait ReplySink {
    /// Deliver the result of a previously-parked request.
    fn task_reply(&mut self, endpt: Endpoint, id: RequestId, result: Reply);

    /// Notify a select watcher that `ops` became ready on `minor`.
    fn select_reply(&mut self, sel_endpt: Endpoint, minor: SlotId, ops: SelectMask);
}

/// Severity for [`LogSink`], mirroring the handful of levels the kernel's
/// `serial_println!` call sites implicitly use (info/warn/error by prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A logging sink the embedder installs. `no_std` rules out a concrete
/// backend (no UART, no stdout here), so logging is a trait rather than a
/// macro bound to one transport, unlike the kernel's `serial_println!`
/// which can assume a UART exists.
pub trait LogSink {
    fn log(&mut self, level: LogLevel, msg: &str);
}

/// A `LogSink` that discards everything — the default when the embedder
/// installs nothing.
pub struct NullLog;

impl LogSink for NullLog {
    fn log(&mut self, _level: LogLevel, _msg: &str) {}
}

/// Log through a [`LogSink`] without the call site building the message
/// when nothing is listening, mirroring how the kernel's `serial_println!`
/// reads at each call site rather than through a returned diagnostic value.
#[macro_export]
macro_rules! log {
    ($sink:expr, $level:expr, $($arg:tt)*) => {
        $sink.log($level, &alloc::format!($($arg)*))
    };
}

/// Lifecycle hooks owned by the dispatch harness: releasing
/// ancillary FD tokens staged on a closed slot, and the SIGTERM/`exit_left`
/// drain-to-zero callback. Grouped in one trait the way `drivers::hal::Driver`
/// groups a device's init/read/write hooks behind one interface, rather than
/// threading three unrelated closures through `close`.
pub trait LifecycleHooks {
    /// Release passed-FD tokens staged in a slot's `ancillary` list. The
    /// core never interprets the tokens, it only forwards them verbatim.
    fn release_ancillary(&mut self, tokens: &[u32]);

    /// Called once, when a `close` makes `exit_left` reach zero during an
    /// in-progress shutdown.
    fn terminate(&mut self);
}

/// A `LifecycleHooks` that does nothing — the default for embedders with no
/// passed-FD support and no shutdown sequencing to run.
pub struct NullLifecycle;

impl LifecycleHooks for NullLifecycle {
    fn release_ancillary(&mut self, _tokens: &[u32]) {}
    fn terminate(&mut self) {}
}

/// Parameters threaded through a read/write/ioctl entry point: the
/// `(endpoint, grant, size, flags, request_id)` tuple a character-device
/// entry point receives on every call.
#[derive(Debug, Clone, Copy)]
pub struct RequestArgs {
    pub endpt: Endpoint,
    pub grant: Grant,
    pub size: usize,
    /// The `NONBLOCK` bit of `flags`.
    pub nonblock: bool,
    pub id: RequestId,
}

/// Documentation-only pin of what the control/ioctl decoder
/// needs from the core: peer linking and backlog access via
/// [`SocketTable`](crate::table::SocketTable)'s public methods, and
/// `suspend_for_control`/`park` to pre-set a `Connect`/`Accept` suspension
/// before parking. The core never calls into this trait — the collaborator
/// calls into the table and dispatcher directly — so it carries no methods
/// of its own; it exists only so the crate's expectations of that
/// collaborator are pinned in one place, the way `drivers::hal::Driver`
/// pins what the HAL expects of a concrete driver without calling back into
/// driver internals it doesn't own.
pub trait ControlHooks {}

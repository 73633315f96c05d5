//! Core state machine for a character-device-driven UNIX domain socket
//! service.
//!
//! This crate owns the socket table, per-socket ring buffers, the
//! suspension/wakeup protocol, select readiness, and the read/write data
//! path that ties two sockets together through flow control. It does not
//! own a device tree, a scheduler, or a network stack — those, along with
//! the control-operation decoder (`bind`/`connect`/`listen`/`accept`/
//! `shutdown`), the cross-endpoint safe-copy primitive, and the logging
//! sink, are supplied by the embedder through the traits in [`collab`].
//!
//! # Layout
//!
//! - [`table`] — the fixed-size socket table and its slots.
//! - [`ring`] — the per-socket circular byte buffer.
//! - [`datapath`] — `perform_read`/`perform_write`, the actual state
//!   machine.
//! - [`suspend`] — parking a request and replaying it on wakeup or cancel.
//! - [`select`] — select/poll readiness and asynchronous notification.
//! - [`dispatch`] — the character-device entry points
//!   (`open`/`read`/`write`/`close`/`cancel`/`select`) and the
//!   `close`/`reset` lifecycle.
//! - [`collab`] — the traits the embedder implements.
//! - [`error`] — the crate's single error type.
//! - [`sync`] — the spinlock guarding [`table::SocketTableHandle`] for
//!   multi-CPU embedders.
//!
//! # Configuration
//!
//! Table shape is fixed at build time via the constants re-exported below
//! ([`N`], [`BUF_CAP`], [`SOMAXCONN`], [`PATH_MAX`], [`OPEN_MAX`]). A
//! downstream embedder wanting different sizes forks these constants —
//! there is no runtime config surface, since a fixed-size kernel table has
//! nothing to load from disk.
#![no_std]

extern crate alloc;

pub mod collab;
pub mod datapath;
pub mod dispatch;
pub mod error;
pub mod ring;
pub mod select;
pub mod suspend;
pub mod sync;
pub mod table;

pub use collab::{
    ControlHooks, Endpoint, EndpointCopy, Grant, LifecycleHooks, LogLevel, LogSink, NullLifecycle,
    NullLog, Reply, ReplySink, RequestArgs, RequestId, SelectMask, SlotId,
};
pub use dispatch::EntryOutcome;
pub use error::{Result, UdsError};
pub use table::{
    Addr, Mode, SockType, SocketSlot, SocketTable, SocketTableHandle, SuspendKind, BUF_CAP, N,
    OPEN_MAX, PATH_MAX, SOMAXCONN,
};

#[cfg(test)]
mod scenarios;

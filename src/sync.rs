//! A minimal spinlock for the common case where the embedding kernel calls
//! into the socket core from more than one CPU, serialized only by whatever
//! the dispatch harness already does around its entry points.
//!
//! Grounded on `sync::spinlock::Spinlock`, the IRQ-safe spinlock the kernel
//! wraps every shared driver-global table in (`PIPES`, `TCP_CONNECTIONS`,
//! `net::tcp::TCP_CONNECTIONS`). This crate cannot reuse that type directly —
//! its IRQ disable/restore goes through `crate::arch::hal`, an
//! architecture-specific hook this library has no access to — so this is a
//! plain spin-on-atomic lock with the same `lock()` → RAII guard shape,
//! minus interrupt bookkeeping. An embedder running with interrupts must
//! still mask them itself before calling in, the same way any embedder of a
//! `no_std` library without its own IRQ hooks would.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A spinlock protecting data of type `T`.
pub struct Spinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for Spinlock<T> {}
unsafe impl<T: Send> Send for Spinlock<T> {}

/// RAII guard for a held [`Spinlock`].
pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Spinlock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, spinning until it becomes available.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
        SpinlockGuard { lock: self }
    }

    /// Try to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
            .then(|| SpinlockGuard { lock: self })
    }
}

impl<'a, T> Deref for SpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}

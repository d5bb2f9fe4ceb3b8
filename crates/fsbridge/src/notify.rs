//! `EventFdNotifier` — default `Notifier` implementation (Linux).
//!
//! Writes to an eventfd to wake the host event loop. Coalescing: multiple
//! `notify()` calls before the host reads the fd result in a single
//! wakeup (eventfd counter semantics). The host polls
//! `FsBridge::completion_fd()` and calls `drain()` on readiness.

#![cfg(any(target_os = "linux", target_os = "android"))]

use std::os::unix::io::RawFd;

use fsbridge_core::error::{BridgeError, Result};
use fsbridge_core::notifier::Notifier;

use crate::exec::errno;

pub struct EventFdNotifier {
    fd: RawFd,
}

impl EventFdNotifier {
    /// Create a new nonblocking eventfd. The notifier owns the fd and
    /// closes it on drop.
    pub fn create() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(BridgeError::Os(errno()));
        }
        Ok(Self { fd })
    }

    /// The raw descriptor for the host's poll set.
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Notifier for EventFdNotifier {
    fn notify(&self) -> Result<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let e = errno();
            // EAGAIN means the counter is saturated — a wakeup is already
            // pending, which is all we need.
            if e == libc::EAGAIN {
                return Ok(());
            }
            return Err(BridgeError::Os(e));
        }
        Ok(())
    }
}

impl Drop for EventFdNotifier {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_and_read() {
        let n = EventFdNotifier::create().unwrap();
        n.notify().unwrap();
        n.notify().unwrap();

        // Both signals coalesce into one counter read.
        let mut count: u64 = 0;
        let ret = unsafe {
            libc::read(
                n.fd(),
                &mut count as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        assert_eq!(ret, 8);
        assert_eq!(count, 2);

        // Nothing pending now; nonblocking read reports EAGAIN.
        let ret = unsafe {
            libc::read(
                n.fd(),
                &mut count as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        assert_eq!(ret, -1);
        assert_eq!(errno(), libc::EAGAIN);
    }
}

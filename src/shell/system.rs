// Copyright 2018-2025 the Deno authors. MIT license.

//! Blocking calls that cooperate with asynchronous signal delivery.
//!
//! SIGINT is caught without `SA_RESTART`, so reads, writes and waits can
//! come back with `EINTR`. Each call either retries or gives up depending
//! on whether an interrupt is waiting to be acted on.

use std::os::fd::AsRawFd;
use std::os::fd::BorrowedFd;

use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::Pid;

use super::signals;
use super::status::RawStatus;

/// What an `EINTR` should turn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
  /// The signal was benign, restart the call.
  Retry,
  /// A fatal signal is pending, give up and unwind.
  Abort,
}

pub fn interruption() -> Interruption {
  if signals::fatal_pending() {
    Interruption::Abort
  } else {
    Interruption::Retry
  }
}

/// Writes the whole buffer. Errors other than an aborting interrupt end the
/// write silently.
pub fn write_all(fd: BorrowedFd<'_>, mut buf: &[u8]) -> Result<(), Errno> {
  while !buf.is_empty() {
    match nix::unistd::write(fd, buf) {
      Ok(0) => break,
      Ok(n) => buf = &buf[n..],
      Err(Errno::EINTR) => {
        if interruption() == Interruption::Abort {
          return Err(Errno::EINTR);
        }
      }
      Err(_) => break,
    }
  }
  Ok(())
}

pub fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> Result<usize, Errno> {
  loop {
    match nix::unistd::read(fd.as_raw_fd(), buf) {
      Ok(n) => return Ok(n),
      Err(Errno::EINTR) if interruption() == Interruption::Retry => continue,
      Err(err) => return Err(err),
    }
  }
}

/// Blocks until `pid` terminates.
///
/// With `restart` the wait is resumed after any interruption and the
/// caller deals with pending signals afterwards. Without it an `EINTR` is
/// returned to the caller.
pub fn wait_child(pid: Pid, restart: bool) -> Result<RawStatus, Errno> {
  loop {
    match waitpid(pid, None) {
      Ok(status) => {
        if let Some(raw) = RawStatus::from_wait_status(status) {
          tracing::trace!(%pid, raw = raw.raw(), "child terminated");
          return Ok(raw);
        }
      }
      Err(Errno::EINTR) if restart => continue,
      Err(err) => return Err(err),
    }
  }
}

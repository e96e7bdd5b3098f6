// Copyright 2018-2025 the Deno authors. MIT license.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use nix::libc;
use nix::sys::signal::SaFlags;
use nix::sys::signal::SigAction;
use nix::sys::signal::SigHandler;
use nix::sys::signal::SigSet;
use nix::sys::signal::Signal;
use nix::sys::signal::sigaction;

/// Name of the function run when the interpreter exits.
pub const EXIT_HANDLER_NAME: &str = "sigexit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalInfo {
  pub signal: Signal,
  /// Short name used in `$status` and for handler functions.
  pub name: &'static str,
  /// Human readable message. Empty for signals that are never reported.
  pub message: &'static str,
}

const fn info(
  signal: Signal,
  name: &'static str,
  message: &'static str,
) -> SignalInfo {
  SignalInfo {
    signal,
    name,
    message,
  }
}

const SIGNALS: &[SignalInfo] = &[
  info(Signal::SIGHUP, "sighup", "hangup"),
  info(Signal::SIGINT, "sigint", ""),
  info(Signal::SIGQUIT, "sigquit", "quit"),
  info(Signal::SIGILL, "sigill", "illegal instruction"),
  info(Signal::SIGTRAP, "sigtrap", "trace trap"),
  info(Signal::SIGABRT, "sigabrt", "abort"),
  info(Signal::SIGBUS, "sigbus", "bus error"),
  info(Signal::SIGFPE, "sigfpe", "floating point exception"),
  info(Signal::SIGKILL, "sigkill", "killed"),
  info(Signal::SIGUSR1, "sigusr1", "user defined signal 1"),
  info(Signal::SIGSEGV, "sigsegv", "segmentation violation"),
  info(Signal::SIGUSR2, "sigusr2", "user defined signal 2"),
  info(Signal::SIGPIPE, "sigpipe", ""),
  info(Signal::SIGALRM, "sigalrm", "alarm clock"),
  info(Signal::SIGTERM, "sigterm", "terminated"),
  info(Signal::SIGCHLD, "sigchld", ""),
  info(Signal::SIGCONT, "sigcont", "continue"),
  info(Signal::SIGSTOP, "sigstop", "stopped by signal"),
  info(Signal::SIGTSTP, "sigtstp", "stopped via terminal"),
  info(Signal::SIGTTIN, "sigttin", "background tty read"),
  info(Signal::SIGTTOU, "sigttou", "background tty write"),
  info(Signal::SIGURG, "sigurg", "urgent condition on i/o channel"),
  info(Signal::SIGXCPU, "sigxcpu", "exceeded cpu time limit"),
  info(Signal::SIGXFSZ, "sigxfsz", "exceeded file size limit"),
  info(Signal::SIGVTALRM, "sigvtalrm", "virtual timer alarm"),
  info(Signal::SIGPROF, "sigprof", "profiling timer alarm"),
  info(Signal::SIGWINCH, "sigwinch", ""),
  info(Signal::SIGIO, "sigio", "i/o possible"),
  info(Signal::SIGSYS, "sigsys", "bad argument to system call"),
];

pub fn signal_info(number: i32) -> Option<&'static SignalInfo> {
  SIGNALS.iter().find(|info| info.signal as i32 == number)
}

pub fn signal_by_name(name: &str) -> Option<&'static SignalInfo> {
  SIGNALS.iter().find(|info| info.name == name)
}

/// Whether a function with this name is a signal or exit handler.
pub fn is_handler_name(name: &str) -> bool {
  // cheap reject before the table scan
  name.starts_with("sig")
    && (name == EXIT_HANDLER_NAME || signal_by_name(name).is_some())
}

/// Bit per signal number, set from the handler and drained by the
/// interpreter between commands.
static PENDING: AtomicU64 = AtomicU64::new(0);

extern "C" fn catch_signal(signal: libc::c_int) {
  if (0..64).contains(&signal) {
    PENDING.fetch_or(1 << signal, Ordering::SeqCst);
  }
}

pub fn is_pending(signal: Signal) -> bool {
  PENDING.load(Ordering::SeqCst) & (1 << (signal as i32)) != 0
}

/// Removes and returns the lowest numbered pending signal.
pub fn take_pending() -> Option<Signal> {
  loop {
    let pending = PENDING.load(Ordering::SeqCst);
    if pending == 0 {
      return None;
    }
    let number = pending.trailing_zeros();
    let bit = 1u64 << number;
    let swapped = PENDING.compare_exchange(
      pending,
      pending & !bit,
      Ordering::SeqCst,
      Ordering::SeqCst,
    );
    if swapped.is_ok() {
      match Signal::try_from(number as i32) {
        Ok(signal) => return Some(signal),
        Err(_) => continue,
      }
    }
  }
}

/// A blocking call interrupted while this holds should give up rather than
/// retry.
pub fn fatal_pending() -> bool {
  is_pending(Signal::SIGINT)
}

/// Dispositions the interpreter changed at startup, so a child can put
/// them back.
#[derive(Debug, Clone, Default)]
pub struct SignalDispositions {
  changed: Vec<Signal>,
}

impl SignalDispositions {
  /// Catches SIGINT without restarting interrupted calls. An interactive
  /// interpreter also ignores SIGQUIT and SIGTERM. Signals already ignored
  /// when the interpreter started are left alone.
  pub fn install(interactive: bool) -> nix::Result<Self> {
    let catch = SigAction::new(
      SigHandler::Handler(catch_signal),
      SaFlags::empty(),
      SigSet::empty(),
    );
    let ignore =
      SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let mut wanted = vec![(Signal::SIGINT, &catch)];
    if interactive {
      wanted.push((Signal::SIGQUIT, &ignore));
      wanted.push((Signal::SIGTERM, &ignore));
    }
    let mut changed = Vec::new();
    for (signal, action) in wanted {
      // SAFETY: the handler only touches an atomic.
      let previous = unsafe { sigaction(signal, action) }?;
      if previous.handler() == SigHandler::SigIgn {
        // inherited as ignored, keep it that way
        // SAFETY: restores the disposition we just replaced.
        unsafe { sigaction(signal, &previous) }?;
      } else {
        changed.push(signal);
      }
    }
    tracing::debug!(?changed, interactive, "installed signal dispositions");
    Ok(Self { changed })
  }

  /// Restores the default disposition of everything `install` changed.
  pub fn reset_to_defaults(&self) {
    let default =
      SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in &self.changed {
      // SAFETY: installing SIG_DFL has no handler to run.
      let _ = unsafe { sigaction(*signal, &default) };
    }
  }
}

// Copyright 2018-2025 the Deno authors. MIT license.

use nix::errno::Errno;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use super::signals;
use super::system;
use super::types::DIAGNOSTIC_PREFIX;
use super::types::ShellError;
use super::types::ShellState;

/// Most statuses a pipeline or `wait` can record.
pub const MAX_PIPELINE: usize = 512;

/// A wait status in the traditional encoding: exit code in bits 8-15,
/// terminating signal in bits 0-6 and the core dump flag in bit 7.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawStatus(i32);

impl RawStatus {
  pub const SUCCESS: RawStatus = RawStatus(0);
  pub const FAILURE: RawStatus = RawStatus(1 << 8);

  pub fn from_raw(raw: i32) -> Self {
    Self(raw)
  }

  pub fn exited(code: i32) -> Self {
    Self((code & 0xff) << 8)
  }

  pub fn signaled(signal: i32, core_dumped: bool) -> Self {
    Self((signal & 0x7f) | if core_dumped { 0x80 } else { 0 })
  }

  /// Converts a terminal wait result. Stops and continues are not
  /// terminations and give `None`.
  pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
    match status {
      WaitStatus::Exited(_, code) => Some(Self::exited(code)),
      WaitStatus::Signaled(_, signal, core_dumped) => {
        Some(Self::signaled(signal as i32, core_dumped))
      }
      _ => None,
    }
  }

  pub fn raw(self) -> i32 {
    self.0
  }

  pub fn is_success(self) -> bool {
    self.0 == 0
  }

  pub fn is_signaled(self) -> bool {
    let signal = self.0 & 0x7f;
    signal != 0 && signal != 0x7f
  }

  pub fn exit_code(self) -> i32 {
    (self.0 >> 8) & 0xff
  }

  pub fn term_signal(self) -> i32 {
    self.0 & 0x7f
  }

  pub fn core_dumped(self) -> bool {
    self.is_signaled() && self.0 & 0x80 != 0
  }

  /// Single `$status` token: the exit code, the signal name (with `+core`
  /// when it dumped core) or `-N` for a signal without a name.
  pub fn to_status_string(self) -> String {
    if !self.is_signaled() {
      return self.exit_code().to_string();
    }
    let core = if self.core_dumped() { "+core" } else { "" };
    match signals::signal_info(self.term_signal()) {
      Some(info) => format!("{}{}", info.name, core),
      None => format!("-{}{}", self.term_signal(), core),
    }
  }

  /// Inverse of `to_status_string` for assignment to `$status`. Numbers win
  /// over signal names, and anything unrecognized is a plain failure.
  pub fn parse_status_string(token: &str) -> Self {
    if let Some(code) = parse_unsigned(token) {
      return Self::exited(code);
    }
    let (name, core_dumped) = match token.strip_suffix("+core") {
      Some(name) => (name, true),
      None => (token, false),
    };
    match signals::signal_by_name(name) {
      Some(info) => Self::signaled(info.signal as i32, core_dumped),
      None => Self::FAILURE,
    }
  }
}

/// Parses a non-negative decimal number, digits only.
pub fn parse_unsigned(text: &str) -> Option<i32> {
  if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  text.parse().ok()
}

/// Raw statuses of the most recent pipeline, first stage first.
#[derive(Debug, Clone)]
pub struct StatusTracker {
  statuses: Vec<RawStatus>,
}

impl Default for StatusTracker {
  fn default() -> Self {
    Self {
      statuses: vec![RawStatus::SUCCESS],
    }
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("too many statuses ({0}), at most {MAX_PIPELINE} can be recorded")]
pub struct TooManyStatuses(pub usize);

impl StatusTracker {
  pub fn statuses(&self) -> &[RawStatus] {
    &self.statuses
  }

  /// True when every member exited with code zero.
  pub fn is_true(&self) -> bool {
    self.statuses.iter().all(|status| status.is_success())
  }

  /// `$status` as one number. A pipeline is 0 or 1, a single command is
  /// its exit code, and a signal death is 1.
  pub fn scalar(&self) -> i32 {
    match self.statuses.as_slice() {
      [single] if single.is_signaled() => 1,
      [single] => single.exit_code(),
      _ => i32::from(!self.is_true()),
    }
  }

  pub fn store(
    &mut self,
    statuses: &[RawStatus],
  ) -> Result<(), TooManyStatuses> {
    if statuses.len() > MAX_PIPELINE {
      return Err(TooManyStatuses(statuses.len()));
    }
    if statuses.is_empty() {
      self.statuses = vec![RawStatus::SUCCESS];
    } else {
      self.statuses = statuses.to_vec();
    }
    Ok(())
  }

  pub fn store_single(&mut self, status: RawStatus) {
    self.statuses = vec![status];
  }

  /// Tokens for `$status`, last pipeline stage first.
  pub fn to_status_list(&self) -> Vec<String> {
    self
      .statuses
      .iter()
      .rev()
      .map(|status| status.to_status_string())
      .collect()
  }

  /// Stores the statuses named by `$status` tokens. The first token
  /// describes the last stage.
  pub fn parse_status_list(
    &mut self,
    tokens: &[String],
  ) -> Result<(), TooManyStatuses> {
    let statuses = tokens
      .iter()
      .rev()
      .map(|token| RawStatus::parse_status_string(token))
      .collect::<Vec<_>>();
    self.store(&statuses)
  }
}

impl ShellState {
  /// Records the status of a single command.
  pub fn set_status(
    &mut self,
    pid: Option<Pid>,
    status: RawStatus,
  ) -> Result<(), ShellError> {
    self.status_mut().store_single(status);
    self.print_status(pid, status);
    self.exit_if_failed()
  }

  pub fn set_status_bool(&mut self, success: bool) -> Result<(), ShellError> {
    self.set_status(
      None,
      if success {
        RawStatus::SUCCESS
      } else {
        RawStatus::FAILURE
      },
    )
  }

  pub fn set_pipe_status(
    &mut self,
    statuses: &[RawStatus],
  ) -> Result<(), ShellError> {
    if let Err(err) = self.status_mut().store(statuses) {
      self.diagnostic(&err.to_string());
      return self.set_status_bool(false);
    }
    for status in statuses {
      self.print_status(None, *status);
    }
    self.exit_if_failed()
  }

  /// Assignment to `$status`.
  pub fn set_status_list(&mut self, tokens: &[String]) {
    if let Err(err) = self.status_mut().parse_status_list(tokens) {
      self.diagnostic(&err.to_string());
      self.status_mut().store_single(RawStatus::FAILURE);
    }
  }

  pub fn status_list(&self) -> Vec<String> {
    self.status().to_status_list()
  }

  /// Waits for each pid argument in turn and records the results, last
  /// argument first. Bad arguments record a failure and the rest are still
  /// waited for. An interrupted wait abandons the whole operation.
  pub fn wait_for_pids(
    &mut self,
    args: &[String],
    command_name: &str,
  ) -> Result<(), ShellError> {
    if args.len() >= MAX_PIPELINE {
      self.diagnostic(&format!("too many arguments to {command_name}"));
      return self.set_status_bool(false);
    }
    if args.is_empty() {
      return self.set_status_bool(true);
    }
    let count = args.len();
    let mut results = vec![RawStatus::FAILURE; count];
    for (i, arg) in args.iter().enumerate() {
      let slot = count - i - 1;
      // pid 0 would wait for any child of the process group
      let Some(pid) = parse_unsigned(arg).filter(|pid| *pid > 0) else {
        self.diagnostic(&format!("`{arg}' is a bad number"));
        continue;
      };
      let pid = Pid::from_raw(pid);
      match system::wait_child(pid, false) {
        Ok(status) => {
          results[slot] = status;
          self.print_status(Some(pid), status);
        }
        Err(Errno::EINTR) => {
          tracing::debug!(%pid, "wait interrupted");
          return self.set_status_bool(false);
        }
        Err(err) => {
          self.diagnostic(&format!("{pid}: {}", err.desc()));
        }
      }
      self.check_signals()?;
    }
    // count is below MAX_PIPELINE
    let _ = self.status_mut().store(&results);
    self.exit_if_failed()
  }

  /// Reports a status when an interactive user waited for it by pid, or
  /// when a signal killed the command and is worth mentioning.
  fn print_status(&mut self, pid: Option<Pid>, status: RawStatus) {
    let signal = if status.is_signaled() {
      status.term_signal()
    } else {
      0
    };
    let quiet_signal =
      signal == nix::libc::SIGINT || signal == nix::libc::SIGPIPE;
    let worth_printing = (self.options().interactive && pid.is_some())
      || (signal > 0 && (status.core_dumped() || !quiet_signal));
    if !worth_printing {
      return;
    }
    let core = if status.core_dumped() {
      "--core dumped"
    } else {
      ""
    };
    let message = match signals::signal_info(signal) {
      _ if signal == 0 => format!("done ({})", status.exit_code()),
      Some(info) if !info.message.is_empty() => {
        format!("{}{}", info.message, core)
      }
      _ => format!("unknown signal {signal}{core}"),
    };
    let line = match pid {
      Some(pid) => format!("{pid}: {message}"),
      None => message,
    };
    if let Err(err) = self.stderr_mut().write_line(&line) {
      tracing::debug!(%err, "failed printing status");
    }
  }

  /// Under `-e` a failed command outside a condition ends the interpreter.
  fn exit_if_failed(&self) -> Result<(), ShellError> {
    if self.options().exit_on_error
      && !self.in_condition()
      && !self.status().is_true()
    {
      return Err(ShellError::Exit(self.status().scalar()));
    }
    Ok(())
  }

  pub(super) fn diagnostic(&mut self, message: &str) {
    let line = format!("{DIAGNOSTIC_PREFIX}{message}");
    if let Err(err) = self.stderr_mut().write_line(&line) {
      tracing::debug!(%err, "failed printing diagnostic");
    }
  }
}

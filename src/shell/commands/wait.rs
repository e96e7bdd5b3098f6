// Copyright 2018-2025 the Deno authors. MIT license.

use nix::errno::Errno;
use nix::unistd::Pid;

use crate::shell::system;
use crate::shell::types::ExecuteResult;
use crate::shell::types::ShellError;
use crate::shell::types::ShellState;

use super::ShellCommand;
use super::ShellCommandContext;

/// `wait [pid...]`
pub struct WaitCommand;

impl ShellCommand for WaitCommand {
  fn execute(
    &self,
    context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError> {
    if context.args.is_empty() {
      wait_for_all(context.state)?;
      return Ok(ExecuteResult::from_exit_code(0));
    }
    context.state.wait_for_pids(&context.args, "wait")?;
    Ok(ExecuteResult::Recorded)
  }
}

/// Reaps every remaining child.
fn wait_for_all(state: &mut ShellState) -> Result<(), ShellError> {
  loop {
    match system::wait_child(Pid::from_raw(-1), false) {
      Ok(_) => state.check_signals()?,
      Err(Errno::ECHILD) => return Ok(()),
      Err(Errno::EINTR) => state.check_signals()?,
      Err(err) => {
        tracing::debug!(%err, "wait failed");
        return Ok(());
      }
    }
  }
}

// Copyright 2018-2024 the Deno authors. MIT license.

pub(crate) mod args;
mod echo;
mod exit;
mod wait;
mod whatis;

use std::collections::HashMap;
use std::rc::Rc;

use super::types::ExecuteResult;
use super::types::ShellError;
use super::types::ShellPipeWriter;
use super::types::ShellState;

pub use whatis::quote_word;

pub fn builtin_commands() -> HashMap<String, Rc<dyn ShellCommand>> {
  HashMap::from([
    (
      "echo".to_string(),
      Rc::new(echo::EchoCommand) as Rc<dyn ShellCommand>,
    ),
    (
      "exit".to_string(),
      Rc::new(exit::ExitCommand) as Rc<dyn ShellCommand>,
    ),
    (
      "true".to_string(),
      Rc::new(ExitCodeCommand(0)) as Rc<dyn ShellCommand>,
    ),
    (
      "false".to_string(),
      Rc::new(ExitCodeCommand(1)) as Rc<dyn ShellCommand>,
    ),
    (
      "wait".to_string(),
      Rc::new(wait::WaitCommand) as Rc<dyn ShellCommand>,
    ),
    (
      "whatis".to_string(),
      Rc::new(whatis::WhatisCommand) as Rc<dyn ShellCommand>,
    ),
  ])
}

/// What a builtin or function body is handed. `args` excludes the command
/// name.
pub struct ShellCommandContext<'a> {
  pub args: Vec<String>,
  pub state: &'a mut ShellState,
  pub stdout: ShellPipeWriter,
  pub stderr: ShellPipeWriter,
}

/// A command run inside the interpreter: a builtin, or the body of a
/// shell function.
pub trait ShellCommand {
  fn execute(
    &self,
    context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError>;
}

struct ExitCodeCommand(i32);

impl ShellCommand for ExitCodeCommand {
  fn execute(
    &self,
    _context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError> {
    // ignores additional arguments
    Ok(ExecuteResult::from_exit_code(self.0))
  }
}

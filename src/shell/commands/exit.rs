// Copyright 2018-2024 the Deno authors. MIT license.

use anyhow::Result;
use anyhow::bail;

use crate::shell::types::ExecuteResult;
use crate::shell::types::ShellError;

use super::ShellCommand;
use super::ShellCommandContext;
use super::args::ArgKind;
use super::args::parse_arg_kinds;

pub struct ExitCommand;

impl ShellCommand for ExitCommand {
  fn execute(
    &self,
    mut context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError> {
    let current = context.state.status().scalar();
    match execute_exit(&context.args, current) {
      Ok(code) => Ok(ExecuteResult::Exit(code)),
      Err(err) => {
        context.stderr.write_line(&format!("exit: {err}"))?;
        Ok(ExecuteResult::Exit(2))
      }
    }
  }
}

/// Without an argument the interpreter leaves with the current status.
fn execute_exit(args: &[String], current: i32) -> Result<i32> {
  let exit_code = match parse_args(args)? {
    Some(code) => code,
    None => return Ok(current),
  };

  Ok(if exit_code < 0 {
    let code = -exit_code % 256;
    (256 - code) % 256
  } else {
    exit_code % 256
  })
}

fn parse_args(args: &[String]) -> Result<Option<i32>> {
  let args = parse_arg_kinds(args);
  let mut codes = Vec::new();
  for arg in args {
    match arg {
      ArgKind::Arg(arg) => {
        codes.push(arg);
      }
      _ => arg.bail_unsupported()?,
    }
  }

  match codes.as_slice() {
    [] => Ok(None),
    [code] => match code.parse::<i32>() {
      Ok(value) => Ok(Some(value)),
      Err(_) => bail!("numeric argument required."),
    },
    _ => {
      bail!("too many arguments")
    }
  }
}

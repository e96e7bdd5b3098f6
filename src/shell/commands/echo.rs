// Copyright 2018-2024 the Deno authors. MIT license.

use crate::shell::types::ExecuteResult;
use crate::shell::types::ShellError;

use super::ShellCommand;
use super::ShellCommandContext;

pub struct EchoCommand;

impl ShellCommand for EchoCommand {
  fn execute(
    &self,
    mut context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError> {
    let text = echo_text(&context.args);
    context.stdout.write_all(text.as_bytes())?;
    Ok(ExecuteResult::from_exit_code(0))
  }
}

/// `-n` drops the trailing newline and `--` is swallowed, both only as the
/// first argument.
fn echo_text(args: &[String]) -> String {
  let (args, newline) = match args.first().map(String::as_str) {
    Some("-n") => (&args[1..], false),
    Some("--") => (&args[1..], true),
    _ => (args, true),
  };
  let mut text = args.join(" ");
  if newline {
    text.push('\n');
  }
  text
}

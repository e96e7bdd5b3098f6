// Copyright 2018-2025 the Deno authors. MIT license.

use crate::shell::execute::BUILTIN_PREFIX;
use crate::shell::execute::EXEC_PREFIX;
use crate::shell::types::DIAGNOSTIC_PREFIX;
use crate::shell::types::ExecuteResult;
use crate::shell::types::ShellError;
use crate::shell::types::ShellState;
use crate::shell::which::is_absolute;

use super::ShellCommand;
use super::ShellCommandContext;

/// `whatis [name...]`
///
/// Without arguments lists every variable and function in a form that can
/// be read back. Otherwise describes what each name would run as.
pub struct WhatisCommand;

impl ShellCommand for WhatisCommand {
  fn execute(
    &self,
    mut context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError> {
    if context.args.is_empty() {
      for line in describe_all(context.state) {
        context.stdout.write_line(&line)?;
      }
      return Ok(ExecuteResult::from_exit_code(0));
    }
    let mut exit_code = 0;
    for name in &context.args {
      match describe(context.state, name) {
        Ok(lines) => {
          for line in lines {
            context.stdout.write_line(&line)?;
          }
        }
        Err(message) => {
          context
            .stderr
            .write_line(&format!("{DIAGNOSTIC_PREFIX}{message}"))?;
          exit_code = 1;
        }
      }
    }
    Ok(ExecuteResult::from_exit_code(exit_code))
  }
}

fn describe_all(state: &ShellState) -> Vec<String> {
  let mut lines = state
    .variables()
    .into_iter()
    .map(|(name, words)| format_variable(name, words))
    .collect::<Vec<_>>();
  lines.extend(
    state
      .functions()
      .into_iter()
      .map(|(name, function)| format_function(name, &function.text)),
  );
  lines
}

fn describe(state: &mut ShellState, name: &str) -> Result<Vec<String>, String> {
  let mut lines = Vec::new();
  if let Some(words) = state.var_lookup(name) {
    lines.push(format_variable(name, words));
  }
  if let Some(function) = state.fn_lookup(name) {
    lines.push(format_function(name, &function.text));
  }
  if !lines.is_empty() {
    return Ok(lines);
  }
  let is_builtin = name == EXEC_PREFIX
    || name == BUILTIN_PREFIX
    || state.resolve_custom_command(name).is_some();
  if is_builtin && !is_absolute(name) {
    return Ok(vec![format!("{BUILTIN_PREFIX} {name}")]);
  }
  match state.resolve_command_path(name) {
    Ok(path) => Ok(vec![path.display().to_string()]),
    Err(err) => Err(err.to_string()),
  }
}

fn format_variable(name: &str, words: &[String]) -> String {
  let name = quote_word(name);
  match words {
    [word] => format!("{name}={}", quote_word(word)),
    words => {
      let words = words
        .iter()
        .map(|word| quote_word(word))
        .collect::<Vec<_>>();
      format!("{name}=({})", words.join(" "))
    }
  }
}

fn format_function(name: &str, text: &str) -> String {
  format!("fn {} {text}", quote_word(name))
}

fn is_plain(c: char) -> bool {
  c.is_ascii_alphanumeric() || "-_./:+,@%!".contains(c)
}

/// Quotes a word so the shell reads it back unchanged. Quotes inside are
/// doubled.
pub fn quote_word(word: &str) -> String {
  if !word.is_empty() && word.chars().all(is_plain) {
    return word.to_string();
  }
  format!("'{}'", word.replace('\'', "''"))
}

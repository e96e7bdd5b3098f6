// Copyright 2018-2023 the Deno authors. All rights reserved. MIT license.

use anyhow::Context;
use pretty_assertions::assert_eq;
use std::io::Read;
use std::path::PathBuf;
use std::rc::Rc;

use crate::Redirect;
use crate::ShellCommand;
use crate::ShellCommandContext;
use crate::ShellError;
use crate::ShellOptions;
use crate::ShellPipeWriter;
use crate::ShellState;
use crate::execute_command;

use super::types::ExecuteResult;

type FnShellCommandExecute = Box<
  dyn Fn(ShellCommandContext<'_>) -> Result<ExecuteResult, ShellError>,
>;

struct FnShellCommand(FnShellCommandExecute);

impl ShellCommand for FnShellCommand {
  fn execute(
    &self,
    context: ShellCommandContext<'_>,
  ) -> Result<ExecuteResult, ShellError> {
    (self.0)(context)
  }
}

// Clippy is complaining about them all having `File` prefixes,
// but there might be non-file variants in the future.
#[allow(clippy::enum_variant_names)]
enum TestAssertion {
  FileExists(String),
  FileNotExists(String),
  FileTextEquals(String, String),
}

struct TempDir {
  // hold to keep it alive until drop
  _inner: tempfile::TempDir,
  path: PathBuf,
}

impl TempDir {
  pub fn new() -> Self {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().canonicalize().unwrap();
    Self {
      _inner: temp_dir,
      path,
    }
  }
}

struct Step {
  words: Vec<String>,
  redirects: Vec<Redirect>,
}

/// Runs word lists through one interpreter and checks what it printed and
/// recorded. `$TEMP_DIR` in words, paths and expectations is replaced by
/// the test's temporary directory.
pub struct TestBuilder {
  // it is much much faster to lazily create this
  temp_dir: Option<TempDir>,
  env: Vec<String>,
  options: ShellOptions,
  functions: Vec<(String, Rc<dyn ShellCommand>, String)>,
  custom_commands: Vec<(String, Rc<dyn ShellCommand>)>,
  pending_redirects: Vec<Redirect>,
  steps: Vec<Step>,
  expected_exit: Option<i32>,
  expected_stderr: String,
  expected_stdout: String,
  expected_status: Option<Vec<String>>,
  assertions: Vec<TestAssertion>,
}

impl TestBuilder {
  pub fn new() -> Self {
    Self {
      temp_dir: None,
      env: vec!["PATH=/usr/bin:/bin".to_string()],
      options: ShellOptions::default(),
      functions: Default::default(),
      custom_commands: Default::default(),
      pending_redirects: Default::default(),
      steps: Default::default(),
      expected_exit: None,
      expected_stderr: Default::default(),
      expected_stdout: Default::default(),
      expected_status: None,
      assertions: Default::default(),
    }
  }

  fn get_temp_dir(&mut self) -> &mut TempDir {
    self.temp_dir.get_or_insert_with(TempDir::new)
  }

  pub fn temp_dir_path(&mut self) -> PathBuf {
    self.get_temp_dir().path.clone()
  }

  fn expand(&mut self, text: &str) -> String {
    if text.contains("$TEMP_DIR") {
      let temp_dir = self.temp_dir_path().display().to_string();
      text.replace("$TEMP_DIR", &temp_dir)
    } else {
      text.to_string()
    }
  }

  /// Replaces the startup environment.
  pub fn env(&mut self, entries: &[&str]) -> &mut Self {
    let env = entries.iter().map(|entry| self.expand(entry)).collect();
    self.env = env;
    self
  }

  pub fn options(&mut self, options: ShellOptions) -> &mut Self {
    self.options = options;
    self
  }

  pub fn function<F>(&mut self, name: &str, text: &str, execute: F) -> &mut Self
  where
    F: Fn(ShellCommandContext<'_>) -> Result<ExecuteResult, ShellError>
      + 'static,
  {
    self.functions.push((
      name.to_string(),
      Rc::new(FnShellCommand(Box::new(execute))),
      text.to_string(),
    ));
    self
  }

  pub fn custom_command<F>(&mut self, name: &str, execute: F) -> &mut Self
  where
    F: Fn(ShellCommandContext<'_>) -> Result<ExecuteResult, ShellError>
      + 'static,
  {
    self.custom_commands.push((
      name.to_string(),
      Rc::new(FnShellCommand(Box::new(execute))),
    ));
    self
  }

  /// Queues a redirection for the next command.
  pub fn redirect(&mut self, redirect: Redirect) -> &mut Self {
    let redirect = match redirect {
      Redirect::Open { fd, path, mode } => Redirect::Open {
        fd,
        path: PathBuf::from(self.expand(&path.display().to_string())),
        mode,
      },
      redirect => redirect,
    };
    self.pending_redirects.push(redirect);
    self
  }

  pub fn command(&mut self, words: &[&str]) -> &mut Self {
    let words = words.iter().map(|word| self.expand(word)).collect();
    let redirects = std::mem::take(&mut self.pending_redirects);
    self.steps.push(Step { words, redirects });
    self
  }

  pub fn directory(&mut self, path: &str) -> &mut Self {
    let temp_dir = self.get_temp_dir();
    std::fs::create_dir_all(temp_dir.path.join(path)).unwrap();
    self
  }

  pub fn file(&mut self, path: &str, text: &str) -> &mut Self {
    let temp_dir = self.get_temp_dir();
    std::fs::write(temp_dir.path.join(path), text).unwrap();
    self
  }

  pub fn executable(&mut self, path: &str, text: &str) -> &mut Self {
    use std::os::unix::fs::PermissionsExt;

    self.file(path, text);
    let full_path = self.get_temp_dir().path.join(path);
    std::fs::set_permissions(
      full_path,
      std::fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    self
  }

  /// Expects the interpreter to terminate with this status.
  pub fn assert_exit(&mut self, code: i32) -> &mut Self {
    self.expected_exit = Some(code);
    self
  }

  pub fn assert_stderr(&mut self, output: &str) -> &mut Self {
    self.expected_stderr.push_str(output);
    self
  }

  pub fn assert_stdout(&mut self, output: &str) -> &mut Self {
    self.expected_stdout.push_str(output);
    self
  }

  /// Expects `$status` to read back as these words.
  pub fn assert_status(&mut self, words: &[&str]) -> &mut Self {
    self.expected_status =
      Some(words.iter().map(|word| word.to_string()).collect());
    self
  }

  pub fn assert_exists(&mut self, path: &str) -> &mut Self {
    self.get_temp_dir();
    self
      .assertions
      .push(TestAssertion::FileExists(path.to_string()));
    self
  }

  pub fn assert_not_exists(&mut self, path: &str) -> &mut Self {
    self.get_temp_dir();
    self
      .assertions
      .push(TestAssertion::FileNotExists(path.to_string()));
    self
  }

  pub fn assert_file_equals(
    &mut self,
    path: &str,
    file_text: &str,
  ) -> &mut Self {
    self.get_temp_dir();
    self.assertions.push(TestAssertion::FileTextEquals(
      path.to_string(),
      file_text.to_string(),
    ));
    self
  }

  pub fn run(&mut self) {
    let description = self
      .steps
      .iter()
      .map(|step| step.words.join(" "))
      .collect::<Vec<_>>()
      .join("; ");
    let (mut stdout_reader, stdout) = std::io::pipe().unwrap();
    let (mut stderr_reader, stderr) = std::io::pipe().unwrap();

    let mut state = ShellState::new(self.env.clone(), self.options.clone());
    state.set_output(
      ShellPipeWriter::OsPipe(stdout),
      ShellPipeWriter::OsPipe(stderr),
    );
    for (name, command) in self.custom_commands.drain(..) {
      state.add_command(&name, command);
    }
    for (name, body, text) in self.functions.drain(..) {
      state.define_function(&name, body, text);
    }

    let mut exit = None;
    for step in self.steps.drain(..) {
      for redirect in step.redirects {
        state.push_redirect(redirect);
      }
      if let Err(err) = execute_command(&mut state, step.words) {
        exit = state.recover(err);
        if exit.is_some() {
          break;
        }
      }
    }
    let status = state.status_list();
    // closes the write ends
    drop(state);

    let mut actual_stdout = String::new();
    stdout_reader.read_to_string(&mut actual_stdout).unwrap();
    let mut actual_stderr = String::new();
    stderr_reader.read_to_string(&mut actual_stderr).unwrap();

    let expected_stderr = self.expected_stderr.clone();
    assert_eq!(
      actual_stderr,
      self.expand(&expected_stderr),
      "\n\nFailed for: {description}"
    );
    let expected_stdout = self.expected_stdout.clone();
    assert_eq!(
      actual_stdout,
      self.expand(&expected_stdout),
      "\n\nFailed for: {description}"
    );
    assert_eq!(exit, self.expected_exit, "\n\nFailed for: {description}");
    if let Some(expected_status) = &self.expected_status {
      assert_eq!(
        &status, expected_status,
        "\n\nFailed for: {description}"
      );
    }

    let Some(temp_dir) = &self.temp_dir else {
      return;
    };
    for assertion in &self.assertions {
      match assertion {
        TestAssertion::FileExists(path) => {
          assert!(
            temp_dir.path.join(path).exists(),
            "\n\nFailed for: {description}\nExpected '{path}' to exist.",
          )
        }
        TestAssertion::FileNotExists(path) => {
          assert!(
            !temp_dir.path.join(path).exists(),
            "\n\nFailed for: {description}\nExpected '{path}' to not exist.",
          )
        }
        TestAssertion::FileTextEquals(path, text) => {
          let actual_text = std::fs::read_to_string(temp_dir.path.join(path))
            .with_context(|| format!("Error reading {path}"))
            .unwrap();
          assert_eq!(
            &actual_text, text,
            "\n\nFailed for: {description}\nPath: {path}",
          )
        }
      }
    }
  }
}

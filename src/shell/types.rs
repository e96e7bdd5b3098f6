// Copyright 2018-2025 the Deno authors. MIT license.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use nix::errno::Errno;
use thiserror::Error;

use super::commands::ShellCommand;
use super::commands::ShellCommandContext;
use super::commands::args::ArgKind;
use super::commands::args::parse_arg_kinds;
use super::commands::builtin_commands;
use super::environment::EnvironmentCache;
use super::redirect::Redirect;
use super::signals;
use super::signals::SignalDispositions;
use super::status::RawStatus;
use super::status::StatusTracker;
use super::system;
use super::table::SymbolTable;
use super::which::AccessIdentity;

/// Prefix of every diagnostic the interpreter prints itself.
pub const DIAGNOSTIC_PREFIX: &str = "rc: ";

/// Joins the words of a list-valued variable in its environment form.
pub const LIST_SEPARATOR: char = '\u{1}';

#[derive(Debug, Error)]
pub enum ShellError {
  /// The interpreter should terminate with this status.
  #[error("exit {0}")]
  Exit(i32),
  #[error("fork: {0}")]
  Fork(Errno),
  #[error("interrupted")]
  Interrupted,
  #[error("{path}: {}", .source.desc())]
  Redirect {
    path: String,
    #[source]
    source: Errno,
  },
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl ShellError {
  pub fn exit_code(&self) -> i32 {
    match self {
      ShellError::Exit(code) => *code,
      _ => 1,
    }
  }
}

/// Runtime flags of the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
  /// `-i`
  pub interactive: bool,
  /// `-e`
  pub exit_on_error: bool,
  /// `-p`, do not import functions from the environment.
  pub privileged: bool,
  /// `-x`
  pub echo_commands: bool,
  /// Parse `#!` lines ourselves when the kernel refuses a script.
  pub emulate_shebang: bool,
  /// Interpreter given a file the kernel could not execute.
  pub default_interpreter: String,
}

impl Default for ShellOptions {
  fn default() -> Self {
    Self {
      interactive: false,
      exit_on_error: false,
      privileged: false,
      echo_commands: false,
      emulate_shebang: false,
      default_interpreter: "/bin/sh".to_string(),
    }
  }
}

impl ShellOptions {
  pub fn parse_flags(args: &[String]) -> Result<Self> {
    let mut options = Self::default();
    for arg in parse_arg_kinds(args) {
      match arg {
        ArgKind::ShortFlag('i') => options.interactive = true,
        ArgKind::ShortFlag('e') => options.exit_on_error = true,
        ArgKind::ShortFlag('p') => options.privileged = true,
        ArgKind::ShortFlag('x') => options.echo_commands = true,
        ArgKind::LongFlag("emulate-shebang") => options.emulate_shebang = true,
        ArgKind::LongFlag(flag) if flag.starts_with("interpreter=") => {
          options.default_interpreter =
            flag["interpreter=".len()..].to_string();
        }
        _ => arg.bail_unsupported()?,
      }
    }
    Ok(options)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
  /// Leave the interpreter with this status.
  Exit(i32),
  /// Record this exit code as the command's status.
  Continue(i32),
  /// The command already recorded its status.
  Recorded,
}

impl ExecuteResult {
  pub fn from_exit_code(exit_code: i32) -> ExecuteResult {
    ExecuteResult::Continue(exit_code)
  }
}

/// Where a command's output goes.
///
/// Writes retry short writes and benign interruptions. A fatal
/// interruption surfaces as `ShellError::Interrupted`, any other write
/// error is dropped.
#[derive(Debug)]
pub enum ShellPipeWriter {
  OsPipe(std::io::PipeWriter),
  StdFile(std::fs::File),
  Stdout,
  Stderr,
  Null,
}

impl ShellPipeWriter {
  pub fn stdout() -> Self {
    Self::Stdout
  }

  pub fn stderr() -> Self {
    Self::Stderr
  }

  pub fn null() -> Self {
    Self::Null
  }

  pub fn from_std(std_file: std::fs::File) -> Self {
    Self::StdFile(std_file)
  }

  pub fn try_clone(&self) -> std::io::Result<Self> {
    Ok(match self {
      Self::OsPipe(pipe) => Self::OsPipe(pipe.try_clone()?),
      Self::StdFile(file) => Self::StdFile(file.try_clone()?),
      Self::Stdout => Self::Stdout,
      Self::Stderr => Self::Stderr,
      Self::Null => Self::Null,
    })
  }

  pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), ShellError> {
    let result = match self {
      Self::OsPipe(pipe) => system::write_all(pipe.as_fd(), bytes),
      Self::StdFile(file) => system::write_all(file.as_fd(), bytes),
      Self::Stdout => system::write_all(std::io::stdout().as_fd(), bytes),
      Self::Stderr => system::write_all(std::io::stderr().as_fd(), bytes),
      Self::Null => Ok(()),
    };
    result.map_err(|_| ShellError::Interrupted)
  }

  pub fn write_line(&mut self, line: &str) -> Result<(), ShellError> {
    let bytes = format!("{line}\n");
    self.write_all(bytes.as_bytes())
  }
}

/// One binding of a variable. A scoped assignment pushes another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarDef {
  /// `None` once the variable was emptied while a shadowed binding exists.
  pub value: Option<Vec<String>>,
  /// Environment text the value was imported from. Dropped on assignment.
  pub external: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Variable {
  /// The visible binding.
  pub top: VarDef,
  /// Outer bindings, innermost last.
  pub shadowed: Vec<VarDef>,
}

/// Turns exported function text back into a callable body.
pub trait FunctionCompiler {
  fn compile(&self, name: &str, text: &str) -> Result<Rc<dyn ShellCommand>>;
}

#[derive(Clone)]
pub struct Function {
  /// Compiled body. Imported functions are compiled on first use.
  pub body: Option<Rc<dyn ShellCommand>>,
  /// Source text, as exported in `fn_NAME`.
  pub text: String,
}

impl std::fmt::Debug for Function {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Function")
      .field("compiled", &self.body.is_some())
      .field("text", &self.text)
      .finish()
  }
}

pub struct ShellState {
  pub(super) functions: SymbolTable<Function>,
  pub(super) variables: SymbolTable<Variable>,
  /// Command name to the `$path` directory it was found in.
  pub(super) command_cache: SymbolTable<String>,
  pub(super) environment: EnvironmentCache,
  /// Default-valued variables that were never assigned and so stay
  /// out of the environment.
  pub(super) unassigned_defaults: Vec<&'static str>,
  commands: HashMap<String, Rc<dyn ShellCommand>>,
  function_compiler: Option<Rc<dyn FunctionCompiler>>,
  status: StatusTracker,
  options: ShellOptions,
  redirects: Vec<Redirect>,
  cmdargs: VecDeque<PathBuf>,
  dispositions: SignalDispositions,
  pub(super) access: Option<AccessIdentity>,
  in_condition: bool,
  pub(super) newline_on_interrupt: bool,
  stdout: ShellPipeWriter,
  stderr: ShellPipeWriter,
}

impl ShellState {
  /// Creates an interpreter context from the startup environment
  /// (`NAME=VALUE` strings).
  pub fn new(env: Vec<String>, options: ShellOptions) -> Self {
    let mut state = Self {
      functions: SymbolTable::new(),
      variables: SymbolTable::new(),
      command_cache: SymbolTable::new(),
      environment: EnvironmentCache::default(),
      unassigned_defaults: Vec::new(),
      commands: builtin_commands(),
      function_compiler: None,
      status: StatusTracker::default(),
      options,
      redirects: Vec::new(),
      cmdargs: VecDeque::new(),
      dispositions: SignalDispositions::default(),
      access: None,
      in_condition: false,
      newline_on_interrupt: true,
      stdout: ShellPipeWriter::stdout(),
      stderr: ShellPipeWriter::stderr(),
    };
    state.import_environment(env);
    state.install_default_vars();
    state
  }

  pub fn options(&self) -> &ShellOptions {
    &self.options
  }

  pub fn options_mut(&mut self) -> &mut ShellOptions {
    &mut self.options
  }

  pub fn status(&self) -> &StatusTracker {
    &self.status
  }

  pub(super) fn status_mut(&mut self) -> &mut StatusTracker {
    &mut self.status
  }

  /// Single token for a raw status, as used for backquote status.
  pub fn status_string(&self, raw: RawStatus) -> String {
    raw.to_status_string()
  }

  pub fn stdout_mut(&mut self) -> &mut ShellPipeWriter {
    &mut self.stdout
  }

  pub fn stderr_mut(&mut self) -> &mut ShellPipeWriter {
    &mut self.stderr
  }

  pub fn set_output(
    &mut self,
    stdout: ShellPipeWriter,
    stderr: ShellPipeWriter,
  ) {
    self.stdout = stdout;
    self.stderr = stderr;
  }

  /// Registers a builtin, replacing any builtin of the same name.
  pub fn add_command(&mut self, name: &str, command: Rc<dyn ShellCommand>) {
    self.commands.insert(name.to_string(), command);
  }

  pub fn resolve_custom_command(
    &self,
    name: &str,
  ) -> Option<Rc<dyn ShellCommand>> {
    self.commands.get(name).cloned()
  }

  pub fn set_function_compiler(&mut self, compiler: Rc<dyn FunctionCompiler>) {
    self.function_compiler = Some(compiler);
  }

  pub(super) fn function_compiler(&self) -> Option<Rc<dyn FunctionCompiler>> {
    self.function_compiler.clone()
  }

  pub fn in_condition(&self) -> bool {
    self.in_condition
  }

  /// Marks evaluation of an `if`/`while` test or `&&`/`||` operand, where
  /// `-e` does not apply. Returns the previous value.
  pub fn set_in_condition(&mut self, in_condition: bool) -> bool {
    std::mem::replace(&mut self.in_condition, in_condition)
  }

  /// Queues a redirection for the next command.
  pub fn push_redirect(&mut self, redirect: Redirect) {
    self.redirects.push(redirect);
  }

  pub(super) fn take_redirects(&mut self) -> Vec<Redirect> {
    std::mem::take(&mut self.redirects)
  }

  pub(super) fn has_redirects(&self) -> bool {
    !self.redirects.is_empty()
  }

  /// Registers a fifo created for an outstanding `<{...}` construct. It is
  /// removed once the next forked command has been waited for.
  pub fn push_cmdarg(&mut self, fifo: PathBuf) {
    self.cmdargs.push_back(fifo);
  }

  pub(super) fn has_outstanding_cmdarg(&self) -> bool {
    !self.cmdargs.is_empty()
  }

  /// Forgets the oldest fifo. The parent also deletes it, a child only
  /// drops its reference.
  pub(super) fn pop_cmdarg(&mut self, remove: bool) {
    let Some(fifo) = self.cmdargs.pop_front() else {
      return;
    };
    if remove {
      if let Err(err) = std::fs::remove_file(&fifo) {
        tracing::debug!(fifo = %fifo.display(), %err, "failed removing fifo");
      }
    }
  }

  /// Catches SIGINT, and for an interactive interpreter ignores SIGQUIT and
  /// SIGTERM.
  pub fn install_signal_handlers(&mut self) -> nix::Result<()> {
    self.dispositions = SignalDispositions::install(self.options.interactive)?;
    Ok(())
  }

  pub(super) fn reset_signal_dispositions(&self) {
    self.dispositions.reset_to_defaults();
  }

  /// Delivers signals caught since the last check. A signal with a
  /// handler function runs it. An unhandled SIGINT aborts the current
  /// evaluation.
  pub fn check_signals(&mut self) -> Result<(), ShellError> {
    while let Some(signal) = signals::take_pending() {
      let Some(info) = signals::signal_info(signal as i32) else {
        continue;
      };
      if self.fn_lookup(info.name).is_some() {
        tracing::debug!(signal = info.name, "running signal handler");
        super::execute::call_function(self, info.name, Vec::new())?;
        continue;
      }
      if signal == nix::sys::signal::Signal::SIGINT {
        if self.options.interactive && self.newline_on_interrupt {
          self.stderr.write_all(b"\n")?;
        }
        return Err(ShellError::Interrupted);
      }
    }
    Ok(())
  }

  /// Top level recovery point. Returns the status to exit with when the
  /// interpreter should terminate, or `None` to continue reading commands.
  pub fn recover(&mut self, err: ShellError) -> Option<i32> {
    tracing::debug!(%err, "recovering");
    self.redirects.clear();
    self.in_condition = false;
    match err {
      ShellError::Exit(code) => return Some(code),
      ShellError::Interrupted => {}
      err => self.diagnostic(&err.to_string()),
    }
    self.status.store_single(RawStatus::FAILURE);
    if self.options.interactive {
      None
    } else {
      Some(1)
    }
  }

  /// Runs `sigexit` once, if defined.
  pub fn run_exit_handler(&mut self) {
    if self.fn_lookup(signals::EXIT_HANDLER_NAME).is_none() {
      return;
    }
    let result = super::execute::call_function(
      self,
      signals::EXIT_HANDLER_NAME,
      Vec::new(),
    );
    self.delete_fn(signals::EXIT_HANDLER_NAME);
    if let Err(err) = result {
      tracing::debug!(%err, "exit handler failed");
    }
  }

  /// Runs a builtin in this process with the interpreter's writers.
  pub(super) fn run_builtin(
    &mut self,
    command: &dyn ShellCommand,
    args: Vec<String>,
  ) -> Result<ExecuteResult, ShellError> {
    let stdout = self.stdout.try_clone()?;
    let stderr = self.stderr.try_clone()?;
    command.execute(ShellCommandContext {
      args,
      state: self,
      stdout,
      stderr,
    })
  }
}

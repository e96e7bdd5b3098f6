// Copyright 2018-2025 the Deno authors. MIT license.

use std::ffi::CString;
use std::os::fd::AsFd;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::rc::Rc;

use nix::errno::Errno;
use nix::sys::termios;
use nix::sys::termios::Termios;
use nix::unistd::ForkResult;
use nix::unistd::Pid;

use super::commands::ShellCommand;
use super::redirect;
use super::shebang;
use super::status::RawStatus;
use super::system;
use super::types::ExecuteResult;
use super::types::ShellError;
use super::types::ShellPipeWriter;
use super::types::ShellState;
use super::which::is_absolute;

/// Prefix that makes the rest of the line replace the interpreter.
pub const EXEC_PREFIX: &str = "exec";
/// Prefix that skips function lookup for the next word.
pub const BUILTIN_PREFIX: &str = "builtin";

/// What the head of a word list names.
#[derive(Clone)]
pub enum CommandKind {
  /// A program found through `$path`, an absolute name, or no name at all.
  External,
  Function(String),
  Builtin(Rc<dyn ShellCommand>),
}

impl std::fmt::Debug for CommandKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CommandKind::External => write!(f, "External"),
      CommandKind::Function(name) => write!(f, "Function({name})"),
      CommandKind::Builtin(_) => write!(f, "Builtin"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Resolution {
  /// Words left after the `exec` and `builtin` prefixes.
  pub words: Vec<String>,
  pub kind: CommandKind,
  /// An `exec` prefix was seen, so control does not come back.
  pub exec_requested: bool,
}

enum Head {
  Kind(CommandKind),
  Exec,
  Builtin,
}

fn resolve_head(
  state: &ShellState,
  word: Option<&str>,
  saw_builtin: bool,
) -> Head {
  let Some(name) = word.filter(|name| !is_absolute(name)) else {
    return Head::Kind(CommandKind::External);
  };
  if !saw_builtin && state.fn_lookup(name).is_some() {
    return Head::Kind(CommandKind::Function(name.to_string()));
  }
  match name {
    EXEC_PREFIX => Head::Exec,
    BUILTIN_PREFIX => Head::Builtin,
    _ => match state.resolve_custom_command(name) {
      Some(command) => Head::Kind(CommandKind::Builtin(command)),
      None => Head::Kind(CommandKind::External),
    },
  }
}

/// Strips `exec` and `builtin` prefixes and decides what the remaining
/// head names. Functions win over builtins unless the word directly
/// follows `builtin`.
pub fn resolve_command(
  state: &ShellState,
  mut words: Vec<String>,
) -> Resolution {
  let mut consumed = 0;
  let mut saw_builtin = false;
  let mut exec_requested = false;
  let kind = loop {
    let word = words.get(consumed).map(String::as_str);
    match resolve_head(state, word, saw_builtin) {
      Head::Exec => {
        exec_requested = true;
        saw_builtin = false;
      }
      Head::Builtin => saw_builtin = true,
      Head::Kind(kind) => break kind,
    }
    consumed += 1;
  };
  words.drain(..consumed);
  tracing::debug!(?kind, exec_requested, "resolved command");
  Resolution {
    words,
    kind,
    exec_requested,
  }
}

/// Runs a word list and returns to the caller afterwards.
pub fn execute_command(
  state: &mut ShellState,
  words: Vec<String>,
) -> Result<(), ShellError> {
  execute_command_in(state, words, true)
}

/// Runs a word list. Without `parent` the current process is given up to
/// the command: a builtin or function runs and the process exits, a
/// program replaces it.
pub fn execute_command_in(
  state: &mut ShellState,
  words: Vec<String>,
  parent: bool,
) -> Result<(), ShellError> {
  if state.options().echo_commands {
    state.stderr_mut().write_line(&words.join(" "))?;
  }
  let resolution = resolve_command(state, words);
  // a bare `exec` only redirects the interpreter and keeps it running
  let replaces_interpreter =
    resolution.exec_requested && !resolution.words.is_empty();
  let parent = parent && !resolution.exec_requested;
  match launch(state, resolution, parent) {
    Err(ShellError::Exit(code)) => Err(ShellError::Exit(code)),
    // any other failure after `exec` ends the interpreter
    Err(err) if replaces_interpreter => Err(ShellError::Exit(err.exit_code())),
    result => result,
  }
}

/// Everything `execve` needs, prepared before forking.
struct ExecPlan {
  path: PathBuf,
  argv: Vec<CString>,
  env: Vec<CString>,
}

/// Where a launched command continues.
enum LaunchPath {
  /// Run the builtin, function or null command in this process. Control
  /// comes back to the caller only when `returning` is set.
  Builtin { forked: bool, returning: bool },
  /// Replace this process with the program.
  Exec { forked: bool, plan: ExecPlan },
  /// A forked child runs the command, wait for it here.
  Wait {
    pid: Pid,
    saved_termios: Option<Termios>,
    resolved_path: Option<PathBuf>,
  },
}

fn launch(
  state: &mut ShellState,
  resolution: Resolution,
  parent: bool,
) -> Result<(), ShellError> {
  let Resolution {
    words,
    kind,
    exec_requested,
  } = resolution;
  if words.is_empty() && exec_requested {
    let redirects = state.take_redirects();
    return redirect::apply(&redirects);
  }

  let mut plan = None;
  if let (CommandKind::External, Some(name)) = (&kind, words.first()) {
    match state.resolve_command_path(name) {
      Ok(path) => plan = Some(prepare_exec(state, path, &words)?),
      Err(err) => {
        tracing::debug!(%err, "command resolution failed");
        state.diagnostic(&err.to_string());
        let redirects = state.take_redirects();
        redirect::touch(&redirects);
        state.set_status_bool(false)?;
        return if parent {
          Ok(())
        } else {
          Err(ShellError::Exit(err.exit_code()))
        };
      }
    }
  }

  let external = matches!(kind, CommandKind::External);
  let must_fork = (parent && (external || state.has_redirects()))
    || state.has_outstanding_cmdarg();
  match choose_path(state, plan, must_fork, parent)? {
    LaunchPath::Wait {
      pid,
      saved_termios,
      resolved_path,
    } => wait_for_child(state, pid, saved_termios, resolved_path),
    LaunchPath::Builtin { forked, returning } => {
      let result = prepare_child(state, returning)
        .and_then(|()| run_in_process(state, kind, words, returning));
      if forked {
        exit_child(state, result);
      }
      result
    }
    LaunchPath::Exec { forked, plan } => {
      let result = match prepare_child(state, false) {
        Ok(()) => Err(exec_program(state, plan, &words)),
        Err(err) => Err(err),
      };
      if forked {
        exit_child(state, result);
      }
      result
    }
  }
}

fn prepare_exec(
  state: &mut ShellState,
  path: PathBuf,
  words: &[String],
) -> Result<ExecPlan, ShellError> {
  let argv = words
    .iter()
    .map(|word| CString::new(word.as_bytes()))
    .collect::<Result<Vec<_>, _>>()
    .map_err(|err| ShellError::Io(err.into()))?;
  let env = state.make_env().to_vec();
  Ok(ExecPlan { path, argv, env })
}

/// Forks when needed. The parent always ends up on `LaunchPath::Wait`.
fn choose_path(
  state: &mut ShellState,
  plan: Option<ExecPlan>,
  must_fork: bool,
  parent: bool,
) -> Result<LaunchPath, ShellError> {
  let mut forked = false;
  if must_fork {
    let saved_termios = if state.options().interactive {
      termios::tcgetattr(std::io::stdin().as_fd()).ok()
    } else {
      None
    };
    // SAFETY: the interpreter is single threaded, and the child either
    // execs or leaves through `exit_child`.
    match unsafe { nix::unistd::fork() } {
      Err(errno) => return Err(ShellError::Fork(errno)),
      Ok(ForkResult::Parent { child }) => {
        tracing::debug!(pid = %child, "forked");
        return Ok(LaunchPath::Wait {
          pid: child,
          saved_termios,
          resolved_path: plan.map(|plan| plan.path),
        });
      }
      Ok(ForkResult::Child) => forked = true,
    }
  }
  Ok(match plan {
    Some(plan) => LaunchPath::Exec { forked, plan },
    None => LaunchPath::Builtin {
      forked,
      returning: !forked && parent,
    },
  })
}

/// Puts this process in shape to run the command: default signal handling
/// unless control returns to the interpreter, and the queued redirections.
/// Output the redirections move is then written through fds 1 and 2.
fn prepare_child(
  state: &mut ShellState,
  returning: bool,
) -> Result<(), ShellError> {
  if !returning {
    state.reset_signal_dispositions();
  }
  state.pop_cmdarg(false);
  let redirects = state.take_redirects();
  redirect::apply(&redirects)?;
  if redirect::targets(&redirects, 1) {
    *state.stdout_mut() = ShellPipeWriter::stdout();
  }
  if redirect::targets(&redirects, 2) {
    *state.stderr_mut() = ShellPipeWriter::stderr();
  }
  Ok(())
}

fn run_in_process(
  state: &mut ShellState,
  kind: CommandKind,
  mut args: Vec<String>,
  returning: bool,
) -> Result<(), ShellError> {
  if !args.is_empty() {
    args.remove(0);
  }
  match kind {
    CommandKind::Function(name) => call_function(state, &name, args)?,
    CommandKind::Builtin(command) => {
      let result = state.run_builtin(&*command, args)?;
      record_result(state, result)?;
    }
    // a null command only performs its redirections
    CommandKind::External => {}
  }
  if returning {
    Ok(())
  } else {
    Err(ShellError::Exit(state.status().scalar()))
  }
}

fn record_result(
  state: &mut ShellState,
  result: ExecuteResult,
) -> Result<(), ShellError> {
  match result {
    ExecuteResult::Exit(code) => Err(ShellError::Exit(code)),
    ExecuteResult::Continue(code) => {
      state.set_status(None, RawStatus::exited(code))
    }
    ExecuteResult::Recorded => Ok(()),
  }
}

/// Calls a function with `$*` and `$0` bound for the duration of the call.
pub fn call_function(
  state: &mut ShellState,
  name: &str,
  args: Vec<String>,
) -> Result<(), ShellError> {
  let Some(body) = state.function_body(name) else {
    return state.set_status_bool(false);
  };
  state.set_var("*", args.clone(), true);
  state.set_var("0", vec![name.to_string()], true);
  let result = match state.run_builtin(&*body, args) {
    Ok(result) => record_result(state, result),
    Err(err) => Err(err),
  };
  state.delete_var("0", true);
  state.delete_var("*", true);
  result
}

/// Replaces the process image. Only returns on failure, with the error
/// that should end the process.
fn exec_program(
  state: &mut ShellState,
  plan: ExecPlan,
  words: &[String],
) -> ShellError {
  let path = match CString::new(plan.path.as_os_str().as_bytes()) {
    Ok(path) => path,
    Err(err) => return ShellError::Io(err.into()),
  };
  let mut errno = execve(&path, &plan.argv, &plan.env);
  if errno == Errno::ENOEXEC && state.options().emulate_shebang {
    errno = exec_shebang(&plan, &path);
  }
  if errno == Errno::ENOEXEC {
    errno = exec_interpreter(state, &plan, &path);
  }
  let name = words.first().map(String::as_str).unwrap_or_default();
  state.diagnostic(&format!("{name}: {}", errno.desc()));
  ShellError::Exit(1)
}

fn execve(path: &CString, argv: &[CString], env: &[CString]) -> Errno {
  tracing::trace!(?path, "execve");
  match nix::unistd::execve(path, argv, env) {
    Err(errno) => errno,
    Ok(never) => match never {},
  }
}

fn exec_shebang(plan: &ExecPlan, path: &CString) -> Errno {
  match shebang::read_shebang(&plan.path) {
    Ok(shebang) => {
      let args = plan.argv.get(1..).unwrap_or_default();
      let argv = shebang.command_line(path.clone(), args);
      execve(&shebang.interpreter, &argv, &plan.env)
    }
    Err(err) => {
      tracing::debug!(%err, "no usable #! line");
      Errno::ENOEXEC
    }
  }
}

fn exec_interpreter(
  state: &ShellState,
  plan: &ExecPlan,
  path: &CString,
) -> Errno {
  let Ok(interpreter) =
    CString::new(state.options().default_interpreter.as_bytes())
  else {
    return Errno::ENOEXEC;
  };
  let mut argv = vec![interpreter.clone(), path.clone()];
  argv.extend(plan.argv.iter().skip(1).cloned());
  execve(&interpreter, &argv, &plan.env)
}

/// Ends a forked child without returning into the caller.
fn exit_child(state: &mut ShellState, result: Result<(), ShellError>) -> ! {
  let code = match result {
    Ok(()) => state.status().scalar(),
    Err(ShellError::Exit(code)) => code,
    Err(err) => {
      if !matches!(err, ShellError::Interrupted) {
        state.diagnostic(&err.to_string());
      }
      1
    }
  };
  // skips atexit handlers and buffers inherited from the parent
  unsafe { nix::libc::_exit(code & 0xff) }
}

fn wait_for_child(
  state: &mut ShellState,
  pid: Pid,
  saved_termios: Option<Termios>,
  resolved_path: Option<PathBuf>,
) -> Result<(), ShellError> {
  let _ = state.take_redirects();
  let status = match system::wait_child(pid, true) {
    Ok(status) => status,
    Err(errno) => {
      state.pop_cmdarg(true);
      return Err(ShellError::Io(errno.into()));
    }
  };
  if status.is_signaled() {
    if let Some(saved) = saved_termios {
      let stdin = std::io::stdin();
      if let Err(err) =
        termios::tcsetattr(stdin.as_fd(), termios::SetArg::TCSANOW, &saved)
      {
        tracing::debug!(%err, "failed restoring terminal attributes");
      }
    }
  }
  let recorded = state.set_status(None, status);
  if !status.is_signaled() {
    // the child dealt with the interrupt itself
    state.newline_on_interrupt = false;
  }
  let delivered = state.check_signals();
  state.newline_on_interrupt = true;
  state.pop_cmdarg(true);
  if let Some(path) = resolved_path {
    if !status.is_success() {
      state.verify_cmd(&path);
    }
  }
  recorded?;
  delivered
}

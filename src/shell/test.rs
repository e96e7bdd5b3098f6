// Copyright 2018-2024 the Deno authors. MIT license.

use std::path::PathBuf;

use super::commands::ShellCommandContext;
use super::redirect::Redirect;
use super::redirect::RedirectMode;
use super::status::MAX_PIPELINE;
use super::status::RawStatus;
use super::test_builder::TestBuilder;
use super::types::ExecuteResult;
use super::types::ShellError;
use super::types::ShellOptions;

fn output_to(fd: i32, path: &str, mode: RedirectMode) -> Redirect {
  Redirect::Open {
    fd,
    path: PathBuf::from(path),
    mode,
  }
}

#[test]
fn builtins() {
  TestBuilder::new()
    .command(&["echo", "1", "2   3"])
    .assert_stdout("1 2   3\n")
    .assert_status(&["0"])
    .run();

  TestBuilder::new()
    .command(&["echo", "-n", "no newline"])
    .assert_stdout("no newline")
    .run();

  TestBuilder::new()
    .command(&["false"])
    .assert_status(&["1"])
    .run();

  TestBuilder::new()
    .command(&["false"])
    .command(&["exit"])
    .assert_exit(1)
    .run();

  TestBuilder::new()
    .command(&["exit", "7"])
    .command(&["echo", "unreached"])
    .assert_exit(7)
    .run();

  TestBuilder::new()
    .command(&["exit", "bad"])
    .assert_stderr("exit: numeric argument required.\n")
    .assert_exit(2)
    .run();
}

#[test]
fn functions_shadow_builtins() {
  TestBuilder::new()
    .function("echo", "{printf from function}", |mut context| {
      context.stdout.write_line("from function")?;
      Ok(ExecuteResult::from_exit_code(0))
    })
    .command(&["echo", "x"])
    .command(&["builtin", "echo", "x"])
    .command(&["builtin", "builtin", "echo", "y"])
    .assert_stdout("from function\nx\ny\n")
    .run();
}

#[test]
fn function_arguments_are_scoped() {
  TestBuilder::new()
    .function("show", "{echo $0 $*}", |mut context| {
      let zero = context.state.var_lookup("0").unwrap_or_default().join(" ");
      let star = context.state.var_lookup("*").unwrap_or_default().join(",");
      context.stdout.write_line(&format!("{zero}: {star}"))?;
      Ok(ExecuteResult::from_exit_code(3))
    })
    .custom_command("bound", |mut context| {
      let bound = context.state.var_lookup("*").is_some();
      context.stdout.write_line(&bound.to_string())?;
      Ok(ExecuteResult::from_exit_code(0))
    })
    .command(&["show", "a", "b"])
    .command(&["bound"])
    .command(&["show"])
    .assert_stdout("show: a,b\nfalse\nshow: \n")
    .assert_status(&["3"])
    .run();
}

#[test]
fn external_programs() {
  TestBuilder::new()
    .command(&["sh", "-c", "exit 3"])
    .assert_status(&["3"])
    .run();

  TestBuilder::new()
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Create))
    .command(&["sh", "-c", "echo external"])
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Append))
    .command(&["/bin/sh", "-c", "echo absolute"])
    .assert_file_equals("out", "external\nabsolute\n")
    .assert_status(&["0"])
    .run();
}

#[test]
fn signal_death_is_reported() {
  TestBuilder::new()
    .command(&["sh", "-c", "kill -9 $$"])
    .assert_stderr("killed\n")
    .assert_status(&["sigkill"])
    .run();
}

#[test]
fn unknown_command() {
  TestBuilder::new()
    .redirect(output_to(1, "$TEMP_DIR/touched", RedirectMode::Create))
    .command(&["no-such-command-here"])
    .assert_stderr("rc: cannot find `no-such-command-here'\n")
    .assert_status(&["1"])
    .assert_exists("touched")
    .run();

  TestBuilder::new()
    .command(&["./missing-program"])
    .command(&["echo", "still running"])
    .assert_stderr("rc: ./missing-program: No such file or directory\n")
    .assert_stdout("still running\n")
    .run();
}

#[test]
fn exit_on_error() {
  let options = ShellOptions {
    exit_on_error: true,
    ..Default::default()
  };
  TestBuilder::new()
    .options(options.clone())
    .command(&["true"])
    .command(&["sh", "-c", "exit 4"])
    .command(&["echo", "unreached"])
    .assert_exit(4)
    .run();

  TestBuilder::new()
    .options(options)
    .custom_command("guarded", |mut context| {
      let previous = context.state.set_in_condition(true);
      let result = context.state.set_status_bool(false);
      context.state.set_in_condition(previous);
      result?;
      context.stdout.write_line("survived")?;
      Ok(ExecuteResult::Recorded)
    })
    .command(&["guarded"])
    .assert_stdout("survived\n")
    .assert_status(&["1"])
    .run();
}

#[test]
fn echo_commands() {
  TestBuilder::new()
    .options(ShellOptions {
      echo_commands: true,
      ..Default::default()
    })
    .command(&["echo", "hi"])
    .assert_stderr("echo hi\n")
    .assert_stdout("hi\n")
    .run();
}

#[test]
fn null_exec_redirects_the_interpreter() {
  TestBuilder::new()
    .redirect(output_to(243, "$TEMP_DIR/held", RedirectMode::Create))
    .command(&["exec"])
    .custom_command("probe", |mut context| {
      let open = nix::fcntl::fcntl(243, nix::fcntl::FcntlArg::F_GETFD).is_ok();
      context.stdout.write_line(&open.to_string())?;
      Ok(ExecuteResult::from_exit_code(0))
    })
    .command(&["probe"])
    .redirect(Redirect::Close(243))
    .command(&["exec"])
    .command(&["probe"])
    .assert_stdout("true\nfalse\n")
    .assert_exists("held")
    .run();
}

#[test]
fn failed_null_exec_keeps_the_interpreter() {
  let interactive = ShellOptions {
    interactive: true,
    ..Default::default()
  };
  TestBuilder::new()
    .options(interactive)
    .redirect(Redirect::Open {
      fd: 240,
      path: PathBuf::from("$TEMP_DIR/missing"),
      mode: RedirectMode::Read,
    })
    .command(&["exec"])
    .command(&["echo", "still here"])
    .assert_stderr("rc: $TEMP_DIR/missing: No such file or directory\n")
    .assert_stdout("still here\n")
    .assert_status(&["0"])
    .run();

  TestBuilder::new()
    .redirect(Redirect::Open {
      fd: 240,
      path: PathBuf::from("$TEMP_DIR/missing"),
      mode: RedirectMode::Read,
    })
    .command(&["exec"])
    .command(&["echo", "unreached"])
    .assert_stderr("rc: $TEMP_DIR/missing: No such file or directory\n")
    .assert_exit(1)
    .run();
}

#[test]
fn forked_builtin_gets_redirections() {
  TestBuilder::new()
    .custom_command("say", |mut context| {
      context.stdout.write_line("redirected")?;
      context.stderr.write_line("not redirected")?;
      Ok(ExecuteResult::from_exit_code(5))
    })
    .redirect(output_to(1, "$TEMP_DIR/said", RedirectMode::Create))
    .command(&["say"])
    .assert_file_equals("said", "redirected\n")
    .assert_stderr("not redirected\n")
    .assert_status(&["5"])
    .run();
}

#[test]
fn path_assignment_clears_the_cache() {
  let mut builder = TestBuilder::new();
  let temp_dir = builder.temp_dir_path().display().to_string();
  builder
    .directory("a")
    .directory("b")
    .executable("a/tool", "#!/bin/sh\necho a\n")
    .executable("b/tool", "#!/bin/sh\necho b\n")
    .env(&["path=$TEMP_DIR/a"])
    .custom_command("repath", move |context| {
      context
        .state
        .assign_var("path", vec![format!("{temp_dir}/b")], false);
      Ok(ExecuteResult::from_exit_code(0))
    })
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Append))
    .command(&["tool"])
    .command(&["repath"])
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Append))
    .command(&["tool"])
    .assert_file_equals("out", "a\nb\n")
    .run();
}

#[test]
fn vanished_program_is_evicted_from_the_cache() {
  let mut builder = TestBuilder::new();
  let temp_dir = builder.temp_dir_path();
  builder
    .directory("a")
    .directory("b")
    .executable("a/tool", "#!/bin/sh\necho a\n")
    .executable("b/tool", "#!/bin/sh\necho b\n")
    .env(&["path=$TEMP_DIR/a\u{1}$TEMP_DIR/b"])
    .custom_command("vanish", move |_context| {
      std::fs::remove_file(temp_dir.join("a/tool"))?;
      Ok(ExecuteResult::from_exit_code(0))
    })
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Append))
    .command(&["tool"])
    .command(&["vanish"])
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Append))
    .command(&["tool"])
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Append))
    .command(&["tool"])
    .assert_stderr("rc: tool: No such file or directory\n")
    .assert_file_equals("out", "a\nb\n")
    .assert_status(&["0"])
    .run();
}

#[test]
fn file_without_header_runs_under_default_interpreter() {
  TestBuilder::new()
    .executable("plain", "echo fallback\n")
    .env(&["path=$TEMP_DIR"])
    .redirect(output_to(1, "$TEMP_DIR/out", RedirectMode::Create))
    .command(&["plain"])
    .assert_file_equals("out", "fallback\n")
    .run();
}

#[test]
fn status_list() {
  TestBuilder::new()
    .custom_command("assign", |context| {
      let tokens = ["sigterm", "0", "3"].map(String::from);
      context.state.set_status_list(&tokens);
      Ok(ExecuteResult::Recorded)
    })
    .command(&["assign"])
    .assert_status(&["sigterm", "0", "3"])
    .run();

  TestBuilder::new()
    .command(&["wait", "abc"])
    .assert_stderr("rc: `abc' is a bad number\n")
    .assert_status(&["1"])
    .run();
}

#[test]
fn wait_for_pids() {
  let child = std::process::Command::new("/bin/sh")
    .args(["-c", "exit 5"])
    .spawn()
    .unwrap();
  let pid = child.id().to_string();
  TestBuilder::new()
    .command(&["wait", &pid, "bogus"])
    .assert_stderr("rc: `bogus' is a bad number\n")
    .assert_status(&["5", "1"])
    .run();
}

#[test]
fn wait_rejects_pid_zero() {
  let child = std::process::Command::new("/bin/sh")
    .args(["-c", "exit 7"])
    .spawn()
    .unwrap();
  let pid = child.id().to_string();
  TestBuilder::new()
    .command(&["wait", "0"])
    .custom_command("status", |mut context| {
      let status = context.state.status_list().join(" ");
      context.stdout.write_line(&status)?;
      Ok(ExecuteResult::Recorded)
    })
    .command(&["status"])
    .command(&["wait", &pid])
    .assert_stderr("rc: `0' is a bad number\n")
    .assert_stdout("1\n")
    .assert_status(&["7"])
    .run();
}

#[test]
fn interactive_wait_reports_the_pid() {
  let child = std::process::Command::new("/bin/sh")
    .args(["-c", "exit 3"])
    .spawn()
    .unwrap();
  let pid = child.id().to_string();
  TestBuilder::new()
    .options(ShellOptions {
      interactive: true,
      ..Default::default()
    })
    .command(&["wait", &pid])
    .assert_stderr(&format!("{pid}: done (3)\n"))
    .assert_status(&["3"])
    .run();
}

#[test]
fn signal_messages() {
  fn recording(
    status: RawStatus,
  ) -> impl Fn(ShellCommandContext<'_>) -> Result<ExecuteResult, ShellError>
  {
    move |context: ShellCommandContext<'_>| {
      context.state.set_status(None, status)?;
      Ok(ExecuteResult::Recorded)
    }
  }

  TestBuilder::new()
    .custom_command("segv", recording(RawStatus::signaled(11, true)))
    .custom_command("odd", recording(RawStatus::signaled(40, false)))
    .custom_command("int", recording(RawStatus::signaled(2, false)))
    .custom_command("pipe", recording(RawStatus::signaled(13, false)))
    .command(&["segv"])
    .command(&["odd"])
    .command(&["int"])
    .command(&["pipe"])
    .assert_stderr("segmentation violation--core dumped\n")
    .assert_stderr("unknown signal 40\n")
    .assert_status(&["sigpipe"])
    .run();

  TestBuilder::new()
    .custom_command("odd", recording(RawStatus::signaled(40, false)))
    .command(&["odd"])
    .assert_stderr("unknown signal 40\n")
    .assert_status(&["-40"])
    .run();
}

#[test]
fn pipeline_status() {
  TestBuilder::new()
    .custom_command("pipeline", |context| {
      context.state.set_pipe_status(&[
        RawStatus::exited(0),
        RawStatus::signaled(15, false),
        RawStatus::exited(2),
      ])?;
      Ok(ExecuteResult::Recorded)
    })
    .command(&["pipeline"])
    .assert_stderr("terminated\n")
    .assert_status(&["2", "sigterm", "0"])
    .run();

  TestBuilder::new()
    .custom_command("oversized", |context| {
      let statuses = vec![RawStatus::SUCCESS; MAX_PIPELINE + 1];
      context.state.set_pipe_status(&statuses)?;
      Ok(ExecuteResult::Recorded)
    })
    .command(&["oversized"])
    .assert_stderr(
      "rc: too many statuses (513), at most 512 can be recorded\n",
    )
    .assert_status(&["1"])
    .run();
}

#[test]
fn outstanding_cmdarg_forces_a_fork_and_is_removed() {
  let mut builder = TestBuilder::new();
  let fifo = builder.temp_dir_path().join("fifo");
  builder
    .file("fifo", "")
    .custom_command("register", move |context| {
      context.state.push_cmdarg(fifo.clone());
      Ok(ExecuteResult::from_exit_code(0))
    })
    .command(&["register"])
    .command(&["true"])
    .assert_not_exists("fifo")
    .assert_status(&["0"])
    .run();
}

#[test]
fn whatis() {
  TestBuilder::new()
    .env(&["path=/bin", "x=1\u{1}two words"])
    .function("greet", "{echo hi}", |_context| {
      Ok(ExecuteResult::from_exit_code(0))
    })
    .command(&["whatis", "x", "greet", "echo", "builtin", "sh"])
    .assert_stdout("x=(1 'two words')\nfn greet {echo hi}\n")
    .assert_stdout("builtin echo\nbuiltin builtin\n/bin/sh\n")
    .assert_status(&["0"])
    .run();

  TestBuilder::new()
    .env(&["path="])
    .command(&["whatis", "nothing-by-this-name"])
    .assert_stderr("rc: cannot find `nothing-by-this-name'\n")
    .assert_status(&["1"])
    .run();
}

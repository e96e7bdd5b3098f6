// Copyright 2018-2025 the Deno authors. MIT license.

//! Variables, functions and the environment handed to programs.

use std::ffi::CString;
use std::rc::Rc;

use super::commands::ShellCommand;
use super::signals;
use super::types::Function;
use super::types::LIST_SEPARATOR;
use super::types::ShellState;
use super::types::VarDef;
use super::types::Variable;

/// Variables with a default value. They are only exported once assigned.
pub const MAYBE_EXPORT: [&str; 2] = ["prompt", "version"];

const DEFAULT_PROMPT: [&str; 2] = ["; ", ""];

/// Exported `NAME=VALUE` strings, rebuilt only after a definition changed.
#[derive(Debug)]
pub struct EnvironmentCache {
  entries: Vec<CString>,
  /// Startup entries that were neither variables nor functions.
  foreign: Vec<String>,
  dirty: bool,
}

impl Default for EnvironmentCache {
  fn default() -> Self {
    Self {
      entries: Vec::new(),
      foreign: Vec::new(),
      dirty: true,
    }
  }
}

impl EnvironmentCache {
  pub fn mark_dirty(&mut self) {
    self.dirty = true;
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }
}

/// `PATH` text to `$path` words. An empty component is the current
/// directory.
pub fn split_colon_path(text: &str) -> Vec<String> {
  text
    .split(':')
    .map(|dir| if dir.is_empty() { "." } else { dir }.to_string())
    .collect()
}

impl ShellState {
  pub(super) fn import_environment(&mut self, env: Vec<String>) {
    for entry in env {
      let Some((name, value)) =
        entry.split_once('=').filter(|(name, _)| !name.is_empty())
      else {
        self.environment.foreign.push(entry);
        continue;
      };
      if let Some(fn_name) = name.strip_prefix("fn_") {
        if self.options().privileged {
          tracing::debug!(name = fn_name, "skipping imported function");
        } else if !fn_name.is_empty() {
          let text = value.to_string();
          self.functions.insert(fn_name, Function { body: None, text });
        }
        continue;
      }
      let words = if value.is_empty() {
        Vec::new()
      } else {
        value.split(LIST_SEPARATOR).map(str::to_string).collect()
      };
      let name = name.to_string();
      let binding = self.var_place(&name, false);
      binding.value = Some(words);
      binding.external = Some(entry);
    }
  }

  pub(super) fn install_default_vars(&mut self) {
    if self.var_lookup("path").is_none() {
      if let Some(text) = self.var_lookup("PATH").map(|words| words.join(":"))
      {
        self.set_var("path", split_colon_path(&text), false);
      }
    }
    if self.var_lookup("prompt").is_none() {
      let prompt = DEFAULT_PROMPT.iter().map(|s| s.to_string()).collect();
      self.set_default_var("prompt", prompt);
    }
    if self.var_lookup("version").is_none() {
      let version = vec![format!("rc_exec {}", env!("CARGO_PKG_VERSION"))];
      self.set_default_var("version", version);
    }
  }

  /// Returns the binding an assignment should fill in, creating the
  /// variable when needed. With `stack` an existing variable gets a new
  /// innermost binding, otherwise its current binding is reset.
  pub fn var_place(&mut self, name: &str, stack: bool) -> &mut VarDef {
    self.environment.mark_dirty();
    let (variable, created) =
      self.variables.get_or_insert_with(name, Variable::default);
    if !created {
      let previous = std::mem::take(&mut variable.top);
      if stack {
        variable.shadowed.push(previous);
      }
    }
    &mut variable.top
  }

  /// Assigns without the `path`/`PATH` aliasing.
  pub fn set_var(&mut self, name: &str, words: Vec<String>, stack: bool) {
    self.var_place(name, stack).value = Some(words);
    self.set_exportable(name, true);
  }

  /// Assigns a variable, keeping `path` and `PATH` in step.
  pub fn assign_var(&mut self, name: &str, words: Vec<String>, stack: bool) {
    match name {
      "path" => {
        let text = words.join(":");
        self.set_var(name, words, stack);
        self.set_var("PATH", vec![text], stack);
        self.reset_command_cache();
      }
      "PATH" => {
        let path = split_colon_path(&words.join(":"));
        self.set_var(name, words, stack);
        self.set_var("path", path, stack);
        self.reset_command_cache();
      }
      _ => self.set_var(name, words, stack),
    }
  }

  /// Assigns a default value that is not exported until reassigned.
  pub fn set_default_var(&mut self, name: &str, words: Vec<String>) {
    self.set_var(name, words, false);
    self.set_exportable(name, false);
  }

  /// Removes a binding. With `stack` the innermost binding is popped,
  /// otherwise it is emptied. A variable with a single binding is removed
  /// from the table either way.
  pub fn delete_var(&mut self, name: &str, stack: bool) {
    self.remove_var(name, stack);
    match name {
      "path" => {
        self.remove_var("PATH", stack);
        self.reset_command_cache();
      }
      "PATH" => {
        self.remove_var("path", stack);
        self.reset_command_cache();
      }
      _ => {}
    }
  }

  fn remove_var(&mut self, name: &str, stack: bool) {
    self.environment.mark_dirty();
    let Some(variable) = self.variables.get_mut(name) else {
      return;
    };
    match variable.shadowed.pop() {
      Some(outer) if stack => variable.top = outer,
      Some(outer) => {
        variable.shadowed.push(outer);
        variable.top = VarDef::default();
      }
      None => {
        self.variables.remove(name);
      }
    }
  }

  pub fn var_lookup(&self, name: &str) -> Option<&[String]> {
    self.variables.get(name)?.top.value.as_deref()
  }

  /// Marks a default-valued variable as assigned (or not) for export.
  pub fn set_exportable(&mut self, name: &str, exportable: bool) {
    let Some(default) = MAYBE_EXPORT.iter().find(|n| **n == name) else {
      return;
    };
    self.unassigned_defaults.retain(|n| n != default);
    if !exportable {
      self.unassigned_defaults.push(default);
    }
    self.environment.mark_dirty();
  }

  pub fn var_exportable(&self, name: &str) -> bool {
    if self.unassigned_defaults.iter().any(|n| *n == name) {
      return false;
    }
    !self
      .var_lookup("noexport")
      .is_some_and(|names| names.iter().any(|n| n == name))
  }

  pub fn fn_exportable(&self, name: &str) -> bool {
    !signals::is_handler_name(name)
  }

  /// Defines or replaces a function.
  pub fn define_function(
    &mut self,
    name: &str,
    body: Rc<dyn ShellCommand>,
    text: impl Into<String>,
  ) {
    self.environment.mark_dirty();
    let function = Function {
      body: Some(body),
      text: text.into(),
    };
    self.functions.insert(name, function);
  }

  pub fn fn_lookup(&self, name: &str) -> Option<&Function> {
    self.functions.get(name)
  }

  /// The body of a function, compiling imported text on first use.
  /// Compile failures are reported and give `None`.
  pub fn function_body(&mut self, name: &str) -> Option<Rc<dyn ShellCommand>> {
    let function = self.functions.get(name)?;
    if let Some(body) = &function.body {
      return Some(body.clone());
    }
    let text = function.text.clone();
    let Some(compiler) = self.function_compiler() else {
      self.diagnostic(&format!("{name}: function cannot be compiled"));
      return None;
    };
    match compiler.compile(name, &text) {
      Ok(body) => {
        tracing::debug!(name, "compiled imported function");
        if let Some(function) = self.functions.get_mut(name) {
          function.body = Some(body.clone());
        }
        Some(body)
      }
      Err(err) => {
        self.diagnostic(&format!("{name}: {err:#}"));
        None
      }
    }
  }

  pub fn delete_fn(&mut self, name: &str) {
    if self.functions.remove(name).is_some() {
      self.environment.mark_dirty();
    }
  }

  /// The environment for a new program: exported variables and functions
  /// plus foreign startup entries, sorted bytewise.
  pub fn make_env(&mut self) -> &[CString] {
    if self.environment.is_dirty() {
      let entries = self.build_env();
      tracing::trace!(count = entries.len(), "rebuilt environment");
      self.environment.entries = entries;
      self.environment.dirty = false;
    }
    &self.environment.entries
  }

  fn build_env(&self) -> Vec<CString> {
    let mut entries = self.environment.foreign.clone();
    for (name, variable) in self.variables.iter() {
      if !self.var_exportable(name) {
        continue;
      }
      let binding = &variable.top;
      if let Some(external) = &binding.external {
        entries.push(external.clone());
      } else if let Some(words) = &binding.value {
        let separator = LIST_SEPARATOR.to_string();
        entries.push(format!("{name}={}", words.join(&separator)));
      }
    }
    for (name, function) in self.functions.iter() {
      if self.fn_exportable(name) {
        entries.push(format!("fn_{name}={}", function.text));
      }
    }
    entries.sort();
    entries
      .into_iter()
      .filter_map(|entry| CString::new(entry).ok())
      .collect()
  }

  pub fn complete_function_names(&self, prefix: &str) -> Vec<String> {
    self
      .functions
      .names_with_prefix(prefix)
      .map(str::to_string)
      .collect()
  }

  pub fn complete_variable_names(&self, prefix: &str) -> Vec<String> {
    self
      .variables
      .names_with_prefix(prefix)
      .map(str::to_string)
      .collect()
  }

  /// Defined variables, sorted by name.
  pub fn variables(&self) -> Vec<(&str, &[String])> {
    let mut variables = self
      .variables
      .iter()
      .filter_map(|(name, variable)| {
        Some((name, variable.top.value.as_deref()?))
      })
      .collect::<Vec<_>>();
    variables.sort_by(|a, b| a.0.cmp(b.0));
    variables
  }

  /// Defined functions, sorted by name.
  pub fn functions(&self) -> Vec<(&str, &Function)> {
    let mut functions = self.functions.iter().collect::<Vec<_>>();
    functions.sort_by(|a, b| a.0.cmp(b.0));
    functions
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::shell::types::ShellOptions;
  use pretty_assertions::assert_eq;

  fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn env_strings(state: &mut ShellState) -> Vec<String> {
    state
      .make_env()
      .iter()
      .map(|entry| entry.to_string_lossy().to_string())
      .collect()
  }

  fn empty_state() -> ShellState {
    ShellState::new(Vec::new(), ShellOptions::default())
  }

  #[test]
  fn scoped_assignment_push_and_pop() {
    let mut state = empty_state();
    state.assign_var("x", strings(&["a"]), true);
    state.assign_var("x", strings(&["b"]), true);
    assert_eq!(state.var_lookup("x"), Some(&strings(&["b"])[..]));
    state.delete_var("x", true);
    assert_eq!(state.var_lookup("x"), Some(&strings(&["a"])[..]));
    state.delete_var("x", true);
    assert_eq!(state.var_lookup("x"), None);
    assert!(state.complete_variable_names("x").is_empty());
  }

  #[test]
  fn unscoped_assignment_overwrites_and_delete_empties() {
    let mut state = empty_state();
    state.assign_var("x", strings(&["outer"]), false);
    state.assign_var("x", strings(&["inner"]), true);
    state.assign_var("x", strings(&["replaced"]), false);
    assert_eq!(state.var_lookup("x"), Some(&strings(&["replaced"])[..]));
    // emptying keeps the outer binding underneath
    state.delete_var("x", false);
    assert_eq!(state.var_lookup("x"), None);
    assert_eq!(state.complete_variable_names("x"), strings(&["x"]));
    state.delete_var("x", true);
    assert_eq!(state.var_lookup("x"), Some(&strings(&["outer"])[..]));
  }

  #[test]
  fn imports_startup_environment() {
    let mut state = ShellState::new(
      strings(&[
        "HOME=/home/user",
        "list=a\u{1}b\u{1}c",
        "fn_greet={echo hi}",
        "=bogus",
        "noequals",
        "PATH=/usr/bin::/bin",
      ]),
      ShellOptions::default(),
    );
    assert_eq!(state.var_lookup("HOME"), Some(&strings(&["/home/user"])[..]));
    assert_eq!(state.var_lookup("list"), Some(&strings(&["a", "b", "c"])[..]));
    assert_eq!(
      state.var_lookup("path"),
      Some(&strings(&["/usr/bin", ".", "/bin"])[..])
    );
    assert_eq!(state.fn_lookup("greet").unwrap().text, "{echo hi}");
    assert!(state.fn_lookup("greet").unwrap().body.is_none());
    assert_eq!(
      env_strings(&mut state),
      strings(&[
        "=bogus",
        "HOME=/home/user",
        "PATH=/usr/bin::/bin",
        "fn_greet={echo hi}",
        "list=a\u{1}b\u{1}c",
        "noequals",
        "path=/usr/bin\u{1}.\u{1}/bin",
      ])
    );
  }

  #[test]
  fn privileged_skips_functions() {
    let options = ShellOptions {
      privileged: true,
      ..Default::default()
    };
    let state = ShellState::new(strings(&["fn_greet={echo hi}"]), options);
    assert!(state.fn_lookup("greet").is_none());
  }

  #[test]
  fn path_aliasing() {
    let mut state = empty_state();
    state.assign_var("path", strings(&["/bin", "", "/usr/bin"]), false);
    assert_eq!(
      state.var_lookup("PATH"),
      Some(&strings(&["/bin::/usr/bin"])[..])
    );
    state.assign_var("PATH", strings(&["/sbin:/opt/bin"]), false);
    assert_eq!(
      state.var_lookup("path"),
      Some(&strings(&["/sbin", "/opt/bin"])[..])
    );
    state.delete_var("path", false);
    assert_eq!(state.var_lookup("PATH"), None);
  }

  #[test]
  fn exportability() {
    let mut state = empty_state();
    assert!(state.var_lookup("prompt").is_some());
    assert!(!state.var_exportable("prompt"));
    assert!(!state.var_exportable("version"));
    state.assign_var("prompt", strings(&["% "]), false);
    assert!(state.var_exportable("prompt"));

    state.assign_var("secret", strings(&["x"]), false);
    assert!(state.var_exportable("secret"));
    state.assign_var("noexport", strings(&["secret", "other"]), false);
    assert!(!state.var_exportable("secret"));

    assert!(!state.fn_exportable("sigint"));
    assert!(!state.fn_exportable("sigexit"));
    assert!(state.fn_exportable("signal"));
    assert!(state.fn_exportable("greet"));
  }

  #[test]
  fn environment_is_rebuilt_after_changes() {
    let mut state = empty_state();
    assert_eq!(env_strings(&mut state), Vec::<String>::new());
    state.assign_var("b", strings(&["2"]), false);
    state.assign_var("a", strings(&["1", "x"]), false);
    state.assign_var("empty", Vec::new(), false);
    assert_eq!(
      env_strings(&mut state),
      strings(&["a=1\u{1}x", "b=2", "empty="])
    );
    assert!(!state.environment.is_dirty());
    state.delete_var("b", false);
    assert!(state.environment.is_dirty());
    assert_eq!(env_strings(&mut state), strings(&["a=1\u{1}x", "empty="]));
  }

  #[test]
  fn environment_skips_entries_with_nul() {
    let mut state = empty_state();
    state.assign_var("bad", strings(&["a\0b"]), false);
    state.assign_var("good", strings(&["ok"]), false);
    assert_eq!(env_strings(&mut state), strings(&["good=ok"]));
  }
}

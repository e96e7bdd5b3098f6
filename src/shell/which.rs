// Copyright 2018-2025 the Deno authors. MIT license.

use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::unistd::Gid;
use nix::unistd::Uid;
use thiserror::Error;

use super::ShellState;

const X_USR: u32 = 0o100;
const X_GRP: u32 = 0o010;
const X_OTH: u32 = 0o001;
const X_ALL: u32 = X_USR | X_GRP | X_OTH;

/// Error when a command path could not be resolved.
#[derive(Error, Debug, PartialEq)]
pub enum CommandPathResolutionError {
  #[error("cannot find `{}'", protect(.0))]
  CommandNotFound(String),
  #[error("{path}: {}", .source.desc())]
  Inaccessible { path: String, source: Errno },
  #[error("command name was empty")]
  CommandEmpty,
}

impl CommandPathResolutionError {
  pub fn exit_code(&self) -> i32 {
    1
  }
}

/// Effective ids the execute permission check is made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
  pub uid: Uid,
  pub gid: Gid,
  pub groups: Vec<Gid>,
}

impl AccessIdentity {
  pub fn current() -> Self {
    let groups = nix::unistd::getgroups().unwrap_or_else(|err| {
      tracing::debug!(%err, "getgroups failed");
      Vec::new()
    });
    Self {
      uid: nix::unistd::geteuid(),
      gid: nix::unistd::getegid(),
      groups,
    }
  }

  /// Whether `path` is a regular file we may execute. Only the permission
  /// class that applies to us is consulted, and root may run anything with
  /// an execute bit.
  pub fn check_executable(&self, path: &Path) -> Result<(), Errno> {
    let metadata = std::fs::metadata(path).map_err(|err| {
      err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO)
    })?;
    let mask = if self.uid.is_root() {
      X_ALL
    } else if self.uid.as_raw() == metadata.uid() {
      X_USR
    } else if self.gid.as_raw() == metadata.gid()
      || self.groups.iter().any(|g| g.as_raw() == metadata.gid())
    {
      X_GRP
    } else {
      X_OTH
    };
    if metadata.file_type().is_file() && metadata.mode() & mask != 0 {
      Ok(())
    } else {
      Err(Errno::EACCES)
    }
  }
}

/// Names that skip function lookup and `$path` search.
pub fn is_absolute(name: &str) -> bool {
  name.starts_with('/') || name.starts_with("./") || name.starts_with("../")
}

/// Appends `name` to a `$path` entry. An empty entry leaves the name as is.
pub fn join(dir: &str, name: &str) -> String {
  if dir.is_empty() {
    name.to_string()
  } else if dir.ends_with('/') {
    format!("{dir}{name}")
  } else {
    format!("{dir}/{name}")
  }
}

/// Replaces unprintable characters with `?` for messages.
pub fn protect(name: &str) -> String {
  name
    .chars()
    .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
    .collect()
}

impl ShellState {
  fn access_identity(&mut self) -> &AccessIdentity {
    self.access.get_or_insert_with(AccessIdentity::current)
  }

  pub fn set_cmd_path(&mut self, name: &str, dir: &str) {
    tracing::trace!(name, dir, "caching command path");
    self.command_cache.insert(name, dir.to_string());
  }

  pub fn lookup_cmd(&self, name: &str) -> Option<&str> {
    self.command_cache.get(name).map(String::as_str)
  }

  pub fn delete_cmd(&mut self, name: &str) {
    if self.command_cache.remove(name).is_some() {
      tracing::debug!(name, "evicted cached command path");
    }
  }

  /// Forgets every cached command path.
  pub fn reset_command_cache(&mut self) {
    if !self.command_cache.is_empty() {
      self.command_cache.clear();
    }
  }

  /// Resolves a command name to the path to execute. Absolute names are
  /// checked directly, others come from the cache or a `$path` search.
  pub fn resolve_command_path(
    &mut self,
    name: &str,
  ) -> Result<PathBuf, CommandPathResolutionError> {
    if name.is_empty() {
      return Err(CommandPathResolutionError::CommandEmpty);
    }
    if is_absolute(name) {
      return match self.access_identity().check_executable(Path::new(name)) {
        Ok(()) => Ok(PathBuf::from(name)),
        Err(source) => Err(CommandPathResolutionError::Inaccessible {
          path: name.to_string(),
          source,
        }),
      };
    }
    if let Some(dir) = self.lookup_cmd(name) {
      tracing::trace!(name, dir, "command path cache hit");
      return Ok(PathBuf::from(join(dir, name)));
    }
    let dirs = self.var_lookup("path").map(<[String]>::to_vec);
    for dir in dirs.unwrap_or_default() {
      let full = join(&dir, name);
      if self.access_identity().check_executable(Path::new(&full)).is_ok() {
        self.set_cmd_path(name, &dir);
        return Ok(PathBuf::from(full));
      }
    }
    Err(CommandPathResolutionError::CommandNotFound(name.to_string()))
  }

  /// Drops the cache entry behind `full_path` when the file can no longer
  /// be executed.
  pub fn verify_cmd(&mut self, full_path: &Path) {
    if self.access_identity().check_executable(full_path).is_ok() {
      return;
    }
    if let Some(name) = full_path.file_name().and_then(|name| name.to_str()) {
      self.delete_cmd(name);
    }
  }
}

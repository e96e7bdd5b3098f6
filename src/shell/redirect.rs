// Copyright 2018-2025 the Deno authors. MIT license.

use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::fd::IntoRawFd;
use std::os::fd::RawFd;
use std::path::Path;
use std::path::PathBuf;

use nix::errno::Errno;

use super::types::ShellError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
  /// `<`
  Read,
  /// `>`
  Create,
  /// `>>`
  Append,
}

/// A pending redirection, applied in the process that runs the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
  Open {
    fd: RawFd,
    path: PathBuf,
    mode: RedirectMode,
  },
  /// `>[fd=target]`
  Dup { fd: RawFd, target: RawFd },
  /// `>[fd=]`
  Close(RawFd),
}

fn open_options(mode: RedirectMode) -> OpenOptions {
  let mut options = OpenOptions::new();
  match mode {
    RedirectMode::Read => options.read(true),
    RedirectMode::Create => options.write(true).create(true).truncate(true),
    RedirectMode::Append => options.append(true).create(true),
  };
  options
}

fn redirect_error(path: &Path, err: std::io::Error) -> ShellError {
  ShellError::Redirect {
    path: path.display().to_string(),
    source: err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO),
  }
}

/// Applies redirections to this process's descriptors, in order.
pub fn apply(redirects: &[Redirect]) -> Result<(), ShellError> {
  for redirect in redirects {
    tracing::trace!(?redirect, "applying redirection");
    match redirect {
      Redirect::Open { fd, path, mode } => {
        let file = open_options(*mode)
          .open(path)
          .map_err(|err| redirect_error(path, err))?;
        if file.as_raw_fd() != *fd {
          nix::unistd::dup2(file.as_raw_fd(), *fd).map_err(|source| {
            ShellError::Redirect {
              path: path.display().to_string(),
              source,
            }
          })?;
        } else {
          // already in place, keep it open
          let _ = file.into_raw_fd();
        }
      }
      Redirect::Dup { fd, target } => {
        nix::unistd::dup2(*target, *fd).map_err(|source| {
          ShellError::Redirect {
            path: target.to_string(),
            source,
          }
        })?;
      }
      Redirect::Close(fd) => match nix::unistd::close(*fd) {
        Ok(()) | Err(Errno::EBADF) => {}
        Err(source) => {
          return Err(ShellError::Redirect {
            path: fd.to_string(),
            source,
          });
        }
      },
    }
  }
  Ok(())
}

/// Whether any of the redirections changes `fd`.
pub fn targets(redirects: &[Redirect], fd: RawFd) -> bool {
  redirects.iter().any(|redirect| match redirect {
    Redirect::Open { fd: target, .. }
    | Redirect::Dup { fd: target, .. }
    | Redirect::Close(target) => *target == fd,
  })
}

/// Performs the file system side effects of output redirections without
/// changing any descriptor.
pub fn touch(redirects: &[Redirect]) {
  for redirect in redirects {
    if let Redirect::Open { path, mode, .. } = redirect {
      if *mode == RedirectMode::Read {
        continue;
      }
      if let Err(err) = open_options(*mode).open(path) {
        tracing::debug!(path = %path.display(), %err, "touch failed");
      }
    }
  }
}

// Copyright 2018-2025 the Deno authors. MIT license.

//! `#!` handling for hosts whose kernel does not run scripts itself.

use std::ffi::CString;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Bytes of the file examined for the header.
const HEADER_LIMIT: usize = 256;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShebangError {
  #[error("unrecognized executable format")]
  Unrecognized,
  #[error("{0}")]
  Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shebang {
  pub interpreter: CString,
  pub argument: Option<CString>,
}

impl Shebang {
  /// Argument vector running `script` with `args` through the interpreter.
  pub fn command_line(
    &self,
    script: CString,
    args: &[CString],
  ) -> Vec<CString> {
    let mut argv = vec![self.interpreter.clone()];
    argv.extend(self.argument.clone());
    argv.push(script);
    argv.extend(args.iter().cloned());
    argv
  }
}

fn is_blank(byte: u8) -> bool {
  byte == b' ' || byte == b'\t'
}

fn skip_blanks(header: &[u8], mut index: usize) -> usize {
  while index < header.len() && is_blank(header[index]) {
    index += 1;
  }
  index
}

fn skip_token(header: &[u8], mut index: usize) -> usize {
  while index < header.len()
    && !is_blank(header[index])
    && header[index] != b'\n'
  {
    index += 1;
  }
  index
}

fn token(bytes: &[u8]) -> Result<CString, ShebangError> {
  CString::new(bytes).map_err(|_| ShebangError::Unrecognized)
}

/// Parses `#!interpreter [argument]` followed by a newline. Blanks may
/// surround both tokens and anything beyond one argument is rejected.
pub fn parse_shebang(header: &[u8]) -> Result<Shebang, ShebangError> {
  let header = &header[..header.len().min(HEADER_LIMIT)];
  let Some(rest) = header.strip_prefix(b"#!") else {
    return Err(ShebangError::Unrecognized);
  };
  let start = skip_blanks(rest, 0);
  let end = skip_token(rest, start);
  if end == rest.len() || start == end {
    return Err(ShebangError::Unrecognized);
  }
  let interpreter = token(&rest[start..end])?;
  if rest[end] == b'\n' {
    return Ok(Shebang {
      interpreter,
      argument: None,
    });
  }
  let arg_start = skip_blanks(rest, end + 1);
  if arg_start == rest.len() {
    return Err(ShebangError::Unrecognized);
  }
  if rest[arg_start] == b'\n' {
    return Ok(Shebang {
      interpreter,
      argument: None,
    });
  }
  let arg_end = skip_token(rest, arg_start);
  if arg_end == rest.len() {
    return Err(ShebangError::Unrecognized);
  }
  if rest[arg_end] != b'\n' {
    let trailing = skip_blanks(rest, arg_end + 1);
    if trailing == rest.len() || rest[trailing] != b'\n' {
      return Err(ShebangError::Unrecognized);
    }
  }
  Ok(Shebang {
    interpreter,
    argument: Some(token(&rest[arg_start..arg_end])?),
  })
}

/// Reads and parses the header of `path`.
pub fn read_shebang(path: &Path) -> Result<Shebang, ShebangError> {
  let file = std::fs::File::open(path)
    .map_err(|err| ShebangError::Io(format!("{}: {err}", path.display())))?;
  let mut header = Vec::with_capacity(HEADER_LIMIT);
  file
    .take(HEADER_LIMIT as u64)
    .read_to_end(&mut header)
    .map_err(|err| ShebangError::Io(format!("{}: {err}", path.display())))?;
  parse_shebang(&header)
}

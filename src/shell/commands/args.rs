// Copyright 2018-2024 the Deno authors. MIT license.

use anyhow::Result;
use anyhow::bail;

#[derive(Debug, PartialEq, Eq)]
pub enum ArgKind<'a> {
  ShortFlag(char),
  LongFlag(&'a str),
  Arg(&'a str),
}

impl ArgKind<'_> {
  pub fn bail_unsupported(&self) -> Result<()> {
    match self {
      ArgKind::Arg(arg) => {
        bail!("unsupported argument: {}", arg)
      }
      ArgKind::LongFlag(name) => {
        bail!("unsupported flag: --{}", name)
      }
      ArgKind::ShortFlag(name) => {
        bail!("unsupported flag: -{}", name)
      }
    }
  }
}

/// Splits arguments into flags and operands. `--` ends the flags, and a
/// lone `-` or a negative number is an operand.
pub fn parse_arg_kinds(args: &[String]) -> Vec<ArgKind<'_>> {
  let mut result = Vec::new();
  let mut operands_only = false;
  for arg in args {
    if operands_only {
      result.push(ArgKind::Arg(arg));
    } else if arg == "-" {
      result.push(ArgKind::Arg("-"));
    } else if arg == "--" {
      operands_only = true;
    } else if let Some(flag) = arg.strip_prefix("--") {
      result.push(ArgKind::LongFlag(flag));
    } else if let Some(flags) = arg.strip_prefix('-') {
      if flags.parse::<i64>().is_ok() {
        result.push(ArgKind::Arg(arg));
      } else {
        result.extend(flags.chars().map(ArgKind::ShortFlag));
      }
    } else {
      result.push(ArgKind::Arg(arg));
    }
  }
  result
}

// Copyright 2018-2022 the Deno authors. All rights reserved. MIT license.

mod commands;
mod environment;
mod execute;
mod redirect;
mod shebang;
pub mod signals;
mod status;
pub mod system;
mod table;
mod types;
mod which;

pub use commands::ShellCommand;
pub use commands::ShellCommandContext;
pub use commands::quote_word;
pub use environment::split_colon_path;
pub use execute::BUILTIN_PREFIX;
pub use execute::CommandKind;
pub use execute::EXEC_PREFIX;
pub use execute::Resolution;
pub use execute::call_function;
pub use execute::execute_command;
pub use execute::execute_command_in;
pub use execute::resolve_command;
pub use redirect::Redirect;
pub use redirect::RedirectMode;
pub use shebang::Shebang;
pub use shebang::ShebangError;
pub use shebang::parse_shebang;
pub use status::MAX_PIPELINE;
pub use status::RawStatus;
pub use status::StatusTracker;
pub use status::TooManyStatuses;
pub use table::SymbolTable;
pub use types::DIAGNOSTIC_PREFIX;
pub use types::ExecuteResult;
pub use types::Function;
pub use types::FunctionCompiler;
pub use types::LIST_SEPARATOR;
pub use types::ShellError;
pub use types::ShellOptions;
pub use types::ShellPipeWriter;
pub use types::ShellState;
pub use types::VarDef;
pub use which::AccessIdentity;
pub use which::CommandPathResolutionError;

#[cfg(test)]
mod test;
#[cfg(test)]
mod test_builder;

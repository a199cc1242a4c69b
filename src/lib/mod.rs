//! Shell environment synchronization library.
//!
//! `envtool` keeps a shell's environment variables in sync with a `.env`
//! file. Each invocation parses the file, compares it against the set of
//! variables a previous invocation exported, and prints the `unset`/`export`
//! directives that move the shell from the old state to the new one. A hook
//! installed into bash or zsh rc files evaluates that output on every prompt
//! draw.
//!
//! # Features
//!
//! - **Pure reconciliation**: the previously managed set and the desired
//!   mapping are explicit inputs; the engine touches no process state
//! - **Fail-open parsing**: a missing `.env` file is an empty mapping, not
//!   an error
//! - **Idempotent hook installation**: rc files are only ever appended to
//!   once
//! - **Optional tracing**: detailed logging when the `tracing` feature is
//!   enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use envtool::parse;
//! use envtool::reconcile::{self, ManagedSet};
//!
//! let desired = parse::load(".env").unwrap_or_default();
//! let previous = ManagedSet::from("FOO,BAR");
//!
//! print!("{}", reconcile::reconcile(&previous, &desired));
//! ```

pub mod hook;
pub mod parse;
pub mod reconcile;

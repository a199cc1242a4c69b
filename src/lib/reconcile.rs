//! Environment reconciliation.
//!
//! This module computes the shell directives that move a shell's environment
//! from a previously managed state to the state described by a `.env` file.
//!
//! # Reconciliation Logic
//!
//! 1. Every previously managed variable missing from the desired mapping is
//!    unset, in the order the managed set was given
//! 2. Every desired variable is exported, in sorted key order, with
//!    shell-safe quoting applied to the value
//! 3. When the desired mapping is non-empty, one final export records the
//!    new managed names under [`MANAGED_VARS_KEY`] so the next invocation
//!    knows which variables it owns
//!
//! [`reconcile`] is a pure function: the managed set and the desired mapping
//! are explicit inputs, and the new managed set is part of the emitted
//! directives, never ambient process state.
//!
//! # Examples
//!
//! ```rust
//! use std::collections::HashMap;
//! use envtool::reconcile::{self, ManagedSet};
//!
//! let previous = ManagedSet::from("OLD_VAR");
//! let desired = HashMap::from([("NEW_VAR".to_string(), "1".to_string())]);
//!
//! let script = reconcile::reconcile(&previous, &desired);
//! assert_eq!(
//!   script.to_string(),
//!   "unset OLD_VAR\nexport NEW_VAR=1\nexport ENVTOOL_MANAGED_ENV_VARS=NEW_VAR"
//! );
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

/// Environment variable carrying the managed names between invocations.
pub const MANAGED_VARS_KEY: &str = "ENVTOOL_MANAGED_ENV_VARS";

const LIST_SEPARATOR: &str = ",";

/// Names of the variables a previous invocation exported.
///
/// Order-preserving and duplicate-free, so the removal pass emits exactly
/// one `unset` per name, in the order the names were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedSet {
  names: Vec<String>,
}

impl From<&str> for ManagedSet {
  /// Deserializes a comma-joined name list. Empty segments are dropped and
  /// duplicate names collapse to their first occurrence.
  fn from(raw: &str) -> Self {
    let mut names: Vec<String> = Vec::new();

    for name in raw.split(LIST_SEPARATOR) {
      if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
      }
    }

    Self { names }
  }
}

impl ManagedSet {
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

/// A single shell command in the emitted sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
  Unset(String),
  Export { name: String, value: String },
}

impl fmt::Display for Directive {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Directive::Unset(name) => write!(f, "unset {}", name),
      Directive::Export { name, value } => {
        write!(f, "export {}={}", name, quote(value))
      }
    }
  }
}

/// Ordered directive sequence, rendered as newline-joined shell commands
/// with no trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveScript {
  directives: Vec<Directive>,
}

impl fmt::Display for DirectiveScript {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, directive) in self.directives.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      write!(f, "{}", directive)?;
    }
    Ok(())
  }
}

impl DirectiveScript {
  pub fn directives(&self) -> &[Directive] {
    &self.directives
  }

  pub fn is_empty(&self) -> bool {
    self.directives.is_empty()
  }
}

/// Computes the directives that transition the shell from the previously
/// managed state to the desired one.
///
/// A name present in both inputs produces only an `export` (update in
/// place). An empty desired mapping unsets everything and emits no
/// bookkeeping export, matching the behavior relied on by the prompt hook.
pub fn reconcile(previous: &ManagedSet, desired: &HashMap<String, String>) -> DirectiveScript {
  #[cfg(feature = "tracing")]
  debug!(
    "Reconciling {} managed names against {} desired variables",
    previous.len(),
    desired.len()
  );

  let mut directives = Vec::new();

  for name in previous.iter() {
    if !name.is_empty() && !desired.contains_key(name) {
      #[cfg(feature = "tracing")]
      trace!("Unsetting {}", name);

      directives.push(Directive::Unset(name.to_string()));
    }
  }

  let mut keys: Vec<&str> = desired.keys().map(String::as_str).collect();
  keys.sort_unstable();

  for key in &keys {
    #[cfg(feature = "tracing")]
    trace!("Exporting {}", key);

    directives.push(Directive::Export {
      name: (*key).to_string(),
      value: desired[*key].clone(),
    });
  }

  if !keys.is_empty() {
    directives.push(Directive::Export {
      name: MANAGED_VARS_KEY.to_string(),
      value: keys.join(LIST_SEPARATOR),
    });
  }

  DirectiveScript { directives }
}

/// Quotes a value for a POSIX-shell `export` statement.
///
/// A value already starting with a single quote is assumed pre-quoted and
/// passes through untouched. A value made only of shell-safe characters
/// stays verbatim; anything else is wrapped in single quotes, with each
/// embedded single quote emitted as `'\''`.
fn quote(value: &str) -> Cow<'_, str> {
  if value.starts_with('\'') {
    return Cow::Borrowed(value);
  }
  if value.is_empty() {
    return Cow::Borrowed("''");
  }
  if value.chars().all(is_shell_safe) {
    return Cow::Borrowed(value);
  }
  Cow::Owned(format!("'{}'", value.replace('\'', "'\\''")))
}

fn is_shell_safe(c: char) -> bool {
  c.is_ascii_alphanumeric()
    || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

#[cfg(test)]
mod tests {
  use super::*;

  fn desired(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(key, value)| (key.to_string(), value.to_string()))
      .collect()
  }

  #[test]
  fn test_fresh_exports_are_sorted() {
    let previous = ManagedSet::default();
    let desired = desired(&[("FOO", "bar"), ("BAZ", "qux")]);

    assert_eq!(
      reconcile(&previous, &desired).to_string(),
      "export BAZ=qux\nexport FOO=bar\nexport ENVTOOL_MANAGED_ENV_VARS=BAZ,FOO"
    );
  }

  #[test]
  fn test_removed_vars_are_unset_in_prior_order() {
    let previous = ManagedSet::from("FOO,BAR,BAZ");
    let desired = desired(&[("BAZ", "updated"), ("QUX", "new")]);

    assert_eq!(
      reconcile(&previous, &desired).to_string(),
      "unset FOO\nunset BAR\nexport BAZ=updated\nexport QUX=new\nexport ENVTOOL_MANAGED_ENV_VARS=BAZ,QUX"
    );
  }

  #[test]
  fn test_update_in_place_emits_no_unset() {
    let previous = ManagedSet::from("FOO,BAR");
    let desired = desired(&[("FOO", "unchanged"), ("BAR", "unchanged")]);

    assert_eq!(
      reconcile(&previous, &desired).to_string(),
      "export BAR=unchanged\nexport FOO=unchanged\nexport ENVTOOL_MANAGED_ENV_VARS=BAR,FOO"
    );
  }

  #[test]
  fn test_empty_desired_unsets_without_bookkeeping() {
    let previous = ManagedSet::from("FOO,BAR");

    assert_eq!(
      reconcile(&previous, &HashMap::new()).to_string(),
      "unset FOO\nunset BAR"
    );
  }

  #[test]
  fn test_empty_inputs_emit_nothing() {
    let script = reconcile(&ManagedSet::default(), &HashMap::new());

    assert!(script.is_empty());
    assert_eq!(script.to_string(), "");
  }

  #[test]
  fn test_reapplying_is_idempotent() {
    let mapping = desired(&[("B", "2"), ("A", "1")]);
    let first = reconcile(&ManagedSet::from("OLD"), &mapping);

    // The bookkeeping export of the first run becomes the managed set of
    // the second.
    let second = reconcile(&ManagedSet::from("A,B"), &mapping);

    assert_eq!(
      second.to_string(),
      "export A=1\nexport B=2\nexport ENVTOOL_MANAGED_ENV_VARS=A,B"
    );
    assert!(
      second
        .directives()
        .iter()
        .all(|d| !matches!(d, Directive::Unset(_)))
    );
    assert_eq!(first.to_string(), format!("unset OLD\n{}", second));
  }

  #[test]
  fn test_bookkeeping_value_lists_sorted_keys() {
    let desired = desired(&[("B", "2"), ("A", "1"), ("C", "3")]);

    let script = reconcile(&ManagedSet::default(), &desired);
    let last = script.directives().last().unwrap();

    assert_eq!(last.to_string(), "export ENVTOOL_MANAGED_ENV_VARS=A,B,C");
  }

  #[test]
  fn test_managed_set_skips_empty_segments() {
    let set = ManagedSet::from(",FOO,,BAR,");

    assert_eq!(set.iter().collect::<Vec<_>>(), vec!["FOO", "BAR"]);
  }

  #[test]
  fn test_managed_set_collapses_duplicates() {
    let previous = ManagedSet::from("FOO,FOO");

    assert_eq!(reconcile(&previous, &HashMap::new()).to_string(), "unset FOO");
  }

  #[test]
  fn test_empty_managed_string() {
    assert!(ManagedSet::from("").is_empty());
  }

  #[test]
  fn test_quote_safe_value_stays_verbatim() {
    assert_eq!(quote("bar"), "bar");
    assert_eq!(quote("https://api.example.com:8080/v1"), "https://api.example.com:8080/v1");
    assert_eq!(quote("a,b=c@d"), "a,b=c@d");
  }

  #[test]
  fn test_quote_value_with_spaces() {
    assert_eq!(quote("hello world"), "'hello world'");
  }

  #[test]
  fn test_quote_escapes_embedded_single_quotes() {
    assert_eq!(quote("it's here"), r"'it'\''s here'");
  }

  #[test]
  fn test_quote_empty_value() {
    assert_eq!(quote(""), "''");
  }

  #[test]
  fn test_quote_passes_prequoted_values_through() {
    assert_eq!(quote("'already quoted'"), "'already quoted'");
  }

  #[test]
  fn test_export_directive_display() {
    let directive = Directive::Export {
      name: "GREETING".to_string(),
      value: "it's here".to_string(),
    };

    assert_eq!(directive.to_string(), r"export GREETING='it'\''s here'");
  }
}

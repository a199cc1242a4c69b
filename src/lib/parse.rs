use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

const COMMENT_PREFIX: &str = "#";
const ASSIGNMENT_OPERATOR: &str = "=";

/// Flat key/value view of `.env`-formatted text.
///
/// Keys and values borrow from the source text. Iteration order is
/// unspecified; later occurrences of a key overwrite earlier ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvFile<'a> {
  vars: HashMap<&'a str, &'a str>,
}

impl<'a> From<&'a str> for EnvFile<'a> {
  fn from(s: &'a str) -> Self {
    #[cfg(feature = "tracing")]
    debug!("Parsing env content with {} lines", s.lines().count());

    let mut vars = HashMap::new();

    for line in s.lines() {
      let line = line.trim();

      if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
        continue;
      }

      let Some((key, value)) = line.split_once(ASSIGNMENT_OPERATOR) else {
        #[cfg(feature = "tracing")]
        trace!("Skipping line without assignment: {:?}", line);

        continue;
      };

      let key = key.trim();
      if key.is_empty() {
        continue;
      }

      let value = strip_outer_quotes(value.trim());

      #[cfg(feature = "tracing")]
      trace!("Parsed variable: key={}, value={:?}", key, value);

      vars.insert(key, value);
    }

    Self { vars }
  }
}

impl<'a> EnvFile<'a> {
  pub fn get(&self, key: &str) -> Option<&'a str> {
    self.vars.get(key).copied()
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }

  pub fn into_map(self) -> HashMap<String, String> {
    self
      .vars
      .into_iter()
      .map(|(key, value)| (key.to_string(), value.to_string()))
      .collect()
  }
}

/// Strips exactly one matching pair of outer `"…"` or `'…'` quotes.
///
/// A lone quote character is not a pair, and no escape processing happens
/// inside the value.
fn strip_outer_quotes(value: &str) -> &str {
  let bytes = value.as_bytes();
  if bytes.len() >= 2 {
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if first == last && (first == b'"' || first == b'\'') {
      return &value[1..value.len() - 1];
    }
  }
  value
}

/// Reads and parses a `.env` file into an owned key/value mapping.
///
/// Only opening and reading the file can fail; any text content parses. A
/// line without an `=` is skipped silently.
pub fn load<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>, EnvFileError> {
  let path = path.as_ref();

  let content = fs::read_to_string(path).map_err(|err| {
    if err.kind() == io::ErrorKind::NotFound {
      EnvFileError::NotFound(path.to_path_buf())
    } else {
      EnvFileError::Io(err)
    }
  })?;

  Ok(EnvFile::from(content.as_str()).into_map())
}

/// Errors that can occur while reading a `.env` file.
#[derive(Debug, thiserror::Error)]
pub enum EnvFileError {
  /// The env file does not exist
  #[error("Env file not found: {0}")]
  NotFound(PathBuf),
  /// Error reading the env file
  #[error("Env file IO error: {0}")]
  Io(std::io::Error),
}

//! Shell hook installation.
//!
//! `envtool env` only takes effect when the shell evaluates its output, so
//! this module installs a hook into bash/zsh rc files that runs
//! `eval "$(envtool env <shell>)"` on every prompt draw (and, for zsh, on
//! every directory change). Installation is idempotent: the hook text is
//! appended only when the rc file does not already contain it, and existing
//! `PROMPT_COMMAND`/`precmd_functions` chains are composed with, not
//! replaced.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fmt, io};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

const DEFAULT_BASHRC: &str = "/etc/bash.bashrc";
const DEFAULT_ZSHRC: &str = "/etc/zsh/zshrc";

/// Shells a hook can be installed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
  Bash,
  Zsh,
}

impl Shell {
  pub fn as_str(&self) -> &'static str {
    match self {
      Shell::Bash => "bash",
      Shell::Zsh => "zsh",
    }
  }

  /// System-wide rc file this shell reads.
  pub fn system_rc_path(&self) -> PathBuf {
    match self {
      Shell::Bash => PathBuf::from(DEFAULT_BASHRC),
      Shell::Zsh => PathBuf::from(DEFAULT_ZSHRC),
    }
  }

  /// Rc file name relative to the user's home directory.
  pub fn user_rc_filename(&self) -> &'static str {
    match self {
      Shell::Bash => ".bashrc",
      Shell::Zsh => ".zshrc",
    }
  }

  /// Hook text appended to the rc file.
  ///
  /// The bash hook chains onto any existing `PROMPT_COMMAND` and preserves
  /// the previous command's exit status; the zsh hook registers itself in
  /// `precmd_functions` and `chpwd_functions` without displacing existing
  /// entries. When `env_file` is set, the embedded invocation passes it
  /// along as `--env-file`.
  pub fn hook_body(&self, env_file: Option<&str>) -> String {
    let env_flag = match env_file {
      Some(path) => format!(" --env-file {}", path),
      None => String::new(),
    };

    match self {
      Shell::Bash => format!(
        r#"
_envtool_hook() {{
  local previous_exit_status=$?;
  trap -- '' SIGINT;
  eval "$(envtool env bash{env_flag})";
  trap - SIGINT;
  return $previous_exit_status;
}};
if ! [[ "${{PROMPT_COMMAND:-}}" =~ _envtool_hook ]]; then
  PROMPT_COMMAND="_envtool_hook${{PROMPT_COMMAND:+;$PROMPT_COMMAND}}"
fi
"#
      ),
      Shell::Zsh => format!(
        r#"
_envtool_hook() {{
  trap -- '' SIGINT;
  eval "$(envtool env zsh{env_flag})";
  trap - SIGINT;
}}
typeset -ag precmd_functions;
if [[ -z "${{precmd_functions[(r)_envtool_hook]+1}}" ]]; then
  precmd_functions=( _envtool_hook ${{precmd_functions[@]}} )
fi
typeset -ag chpwd_functions;
if [[ -z "${{chpwd_functions[(r)_envtool_hook]+1}}" ]]; then
  chpwd_functions=( _envtool_hook ${{chpwd_functions[@]}} )
fi
"#
      ),
    }
  }
}

impl fmt::Display for Shell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl TryFrom<&str> for Shell {
  type Error = InstallError;

  fn try_from(s: &str) -> Result<Self, Self::Error> {
    match s {
      "bash" => Ok(Shell::Bash),
      "zsh" => Ok(Shell::Zsh),
      other => Err(InstallError::UnknownShell(other.to_string())),
    }
  }
}

/// Configuration options for hook installation.
pub struct InstallOptions {
  /// Shells to install the hook for.
  pub shells: Vec<Shell>,
  /// Explicit bash rc path, overriding `user` and the system default.
  pub bashrc: Option<PathBuf>,
  /// Explicit zsh rc path, overriding `user` and the system default.
  pub zshrc: Option<PathBuf>,
  /// Target the user's rc files instead of the system-wide ones.
  pub user: bool,
  /// Env file path embedded in the hook invocation.
  pub env_file: Option<String>,
}

/// Result of one shell's installation.
#[derive(Debug)]
pub struct InstallOutcome {
  pub shell: Shell,
  pub rc_path: PathBuf,
  /// False when the rc file already contained the hook.
  pub appended: bool,
}

/// Per-shell outcomes of one [`HookInstaller::install_with_options`] run.
///
/// A failure on one shell does not abort the others; every selected shell
/// lands in either `installed` or `failures`.
#[derive(Debug, Default)]
pub struct InstallReport {
  pub installed: Vec<InstallOutcome>,
  pub failures: Vec<(Shell, InstallError)>,
}

impl InstallReport {
  pub fn has_failures(&self) -> bool {
    !self.failures.is_empty()
  }
}

/// Installs the prompt hook into shell rc files.
pub struct HookInstaller;

impl HookInstaller {
  pub fn install_with_options(options: InstallOptions) -> InstallReport {
    #[cfg(feature = "tracing")]
    info!("Installing hooks for {} shell(s)", options.shells.len());

    let mut report = InstallReport::default();

    for shell in &options.shells {
      match Self::install_shell(*shell, &options) {
        Ok(outcome) => report.installed.push(outcome),
        Err(err) => report.failures.push((*shell, err)),
      }
    }

    report
  }

  fn install_shell(shell: Shell, options: &InstallOptions) -> Result<InstallOutcome, InstallError> {
    let rc_path = Self::resolve_rc_path(shell, options)?;

    #[cfg(feature = "tracing")]
    debug!(?rc_path, shell = shell.as_str(), "Resolved rc path");

    let body = shell.hook_body(options.env_file.as_deref());
    let appended = Self::ensure_hook_installed(&rc_path, &body)?;

    Ok(InstallOutcome {
      shell,
      rc_path,
      appended,
    })
  }

  fn resolve_rc_path(shell: Shell, options: &InstallOptions) -> Result<PathBuf, InstallError> {
    let explicit = match shell {
      Shell::Bash => options.bashrc.as_ref(),
      Shell::Zsh => options.zshrc.as_ref(),
    };

    if let Some(path) = explicit {
      return Ok(path.clone());
    }

    if options.user {
      let home = dirs::home_dir().ok_or(InstallError::NoHomeDirectory)?;
      return Ok(home.join(shell.user_rc_filename()));
    }

    Ok(shell.system_rc_path())
  }

  /// Appends `body` to the rc file unless it is already present.
  ///
  /// Missing rc files and parent directories are created. Returns whether
  /// anything was appended.
  fn ensure_hook_installed(rc_path: &Path, body: &str) -> Result<bool, InstallError> {
    let existing = match fs::read_to_string(rc_path) {
      Ok(content) => content,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        if let Some(dir) = rc_path.parent() {
          fs::create_dir_all(dir).map_err(InstallError::CreateRc)?;
        }
        fs::write(rc_path, "").map_err(InstallError::CreateRc)?;
        String::new()
      }
      Err(err) => return Err(InstallError::RcIo(err)),
    };

    if existing.contains(body) {
      #[cfg(feature = "tracing")]
      debug!(?rc_path, "Hook already present");

      return Ok(false);
    }

    let mut file = OpenOptions::new()
      .append(true)
      .open(rc_path)
      .map_err(InstallError::AppendRc)?;
    file
      .write_all(body.as_bytes())
      .map_err(InstallError::AppendRc)?;

    Ok(true)
  }
}

/// Errors that can occur while installing a shell hook.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
  /// Shell name is not one the installer knows
  #[error("Unsupported shell: {0}")]
  UnknownShell(String),
  /// Home directory could not be determined
  #[error("Failed to determine home directory")]
  NoHomeDirectory,
  /// Error reading the rc file
  #[error("Rc file IO error: {0}")]
  RcIo(std::io::Error),
  /// Error creating the rc file or its parent directory
  #[error("Failed to create rc file: {0}")]
  CreateRc(std::io::Error),
  /// Error appending the hook to the rc file
  #[error("Failed to append to rc file: {0}")]
  AppendRc(std::io::Error),
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_hook_body_invokes_cli() {
    let body = Shell::Bash.hook_body(None);

    assert!(body.contains("envtool env bash"));
    assert!(body.contains("PROMPT_COMMAND"));
    assert!(!body.contains("--env-file"));
  }

  #[test]
  fn test_hook_body_embeds_env_file() {
    let body = Shell::Zsh.hook_body(Some("config/.env"));

    assert!(body.contains("envtool env zsh --env-file config/.env"));
  }

  #[test]
  fn test_zsh_hook_registers_prompt_and_chpwd() {
    let body = Shell::Zsh.hook_body(None);

    assert!(body.contains("precmd_functions"));
    assert!(body.contains("chpwd_functions"));
  }

  #[test]
  fn test_shell_try_from() {
    assert_eq!(Shell::try_from("bash").unwrap(), Shell::Bash);
    assert_eq!(Shell::try_from("zsh").unwrap(), Shell::Zsh);
    assert!(Shell::try_from("fish").is_err());
  }

  #[test]
  fn test_install_creates_missing_rc_file() {
    let temp_dir = TempDir::new().unwrap();
    let rc_path = temp_dir.path().join("conf.d").join("bashrc");

    let report = HookInstaller::install_with_options(InstallOptions {
      shells: vec![Shell::Bash],
      bashrc: Some(rc_path.clone()),
      zshrc: None,
      user: false,
      env_file: None,
    });

    assert!(!report.has_failures());
    assert!(report.installed[0].appended);

    let content = fs::read_to_string(&rc_path).unwrap();
    assert!(content.contains("_envtool_hook"));
  }

  #[test]
  fn test_install_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let rc_path = temp_dir.path().join("zshrc");

    let options = || InstallOptions {
      shells: vec![Shell::Zsh],
      bashrc: None,
      zshrc: Some(rc_path.clone()),
      user: false,
      env_file: None,
    };

    let first = HookInstaller::install_with_options(options());
    assert!(first.installed[0].appended);
    let after_first = fs::read_to_string(&rc_path).unwrap();

    let second = HookInstaller::install_with_options(options());
    assert!(!second.installed[0].appended);
    let after_second = fs::read_to_string(&rc_path).unwrap();

    assert_eq!(after_first, after_second);
  }

  #[test]
  fn test_install_keeps_existing_rc_content() {
    let temp_dir = TempDir::new().unwrap();
    let rc_path = temp_dir.path().join("bashrc");
    fs::write(&rc_path, "alias ll='ls -la'\n").unwrap();

    let report = HookInstaller::install_with_options(InstallOptions {
      shells: vec![Shell::Bash],
      bashrc: Some(rc_path.clone()),
      zshrc: None,
      user: false,
      env_file: None,
    });
    assert!(!report.has_failures());

    let content = fs::read_to_string(&rc_path).unwrap();
    assert!(content.starts_with("alias ll='ls -la'\n"));
    assert!(content.contains("_envtool_hook"));
  }
}

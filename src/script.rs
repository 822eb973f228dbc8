//! Script identity and the file paths derived from it.
//!
//! A script reference is a path string, optionally followed by
//! whitespace-separated arguments. Everything else (PID file, log file,
//! launch command) is derived deterministically from it.

use crate::config::{LoggingMode, SupervisorConfig};
use crate::error::{Result, SupervisorError};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Path shown for the null sink
pub const NULL_SINK: &str = "/dev/null";

/// A script reference split into its path and argument parts
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptReference {
    pub path: String,
    /// May carry credentials. This buffer is wiped on drop, but the argv
    /// copies made for the launched process are not.
    pub arguments: Zeroizing<String>,
}

impl ScriptReference {
    /// Split a reference such as `"/srv/jobs/worker.php --queue mail"`.
    ///
    /// With `enable_arguments` off, the whole trimmed reference is taken as
    /// the path so that paths containing spaces survive.
    pub fn parse(reference: &str, enable_arguments: bool) -> Result<Self> {
        let (path, arguments) = if enable_arguments {
            let mut tokens = reference.split_whitespace();
            let path = tokens.next().unwrap_or_default().to_string();
            let arguments = tokens.collect::<Vec<_>>().join(" ");
            (path, arguments)
        } else {
            (reference.trim().to_string(), String::new())
        };

        if path.is_empty() {
            return Err(SupervisorError::InvalidScript(
                "No script specified".to_string(),
            ));
        }
        if path.ends_with('/') || Path::new(&path).file_name().is_none() {
            return Err(SupervisorError::InvalidScript(format!(
                "'{}' does not name a file",
                path
            )));
        }

        Ok(Self {
            path,
            arguments: Zeroizing::new(arguments),
        })
    }
}

impl fmt::Debug for ScriptReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptReference")
            .field("path", &self.path)
            .field("arguments", &"<redacted>")
            .finish()
    }
}

/// Destination for the child's stdout and stderr
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Null,
    File(PathBuf),
}

impl LogTarget {
    pub fn path(&self) -> &Path {
        match self {
            LogTarget::Null => Path::new(NULL_SINK),
            LogTarget::File(path) => path,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LogTarget::Null)
    }
}

/// A script under supervision
#[derive(Clone)]
pub struct SupervisedScript {
    script_name: String,
    script_dir: PathBuf,
    arguments: Zeroizing<String>,
    binary: PathBuf,
    pid_file: PathBuf,
    log_target: LogTarget,
}

impl SupervisedScript {
    pub fn new(
        reference: &str,
        binary: impl Into<PathBuf>,
        config: &SupervisorConfig,
    ) -> Result<Self> {
        let parsed = ScriptReference::parse(reference, config.enable_arguments)?;
        let path = Path::new(&parsed.path);

        let script_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| SupervisorError::InvalidScript(parsed.path.clone()))?;
        let script_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let pid_file = script_dir.join(format!(".{}.pid", script_name));
        let log_target = resolve_log_target(&config.logging, &script_dir, &script_name);

        debug!(
            script = %script_name,
            pid_file = %pid_file.display(),
            log = %log_target.path().display(),
            "derived script paths"
        );

        Ok(Self {
            script_name,
            script_dir,
            arguments: parsed.arguments,
            binary: binary.into(),
            pid_file,
            log_target,
        })
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Full path of the script as handed to the binary
    pub fn script_path(&self) -> PathBuf {
        self.script_dir.join(&self.script_name)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// Argument tokens in order, wiped when the returned buffer drops
    pub fn argv(&self) -> Zeroizing<Vec<String>> {
        Zeroizing::new(
            self.arguments
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    pub fn log_target(&self) -> &LogTarget {
        &self.log_target
    }
}

impl fmt::Debug for SupervisedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedScript")
            .field("script_name", &self.script_name)
            .field("script_dir", &self.script_dir)
            .field("binary", &self.binary)
            .field("pid_file", &self.pid_file)
            .field("log_target", &self.log_target)
            .finish_non_exhaustive()
    }
}

fn resolve_log_target(logging: &LoggingMode, script_dir: &Path, script_name: &str) -> LogTarget {
    let file_name = format!("{}.log", script_name);
    match logging {
        LoggingMode::Disabled => LogTarget::Null,
        LoggingMode::CustomDirectory(dir) if dir.is_dir() => {
            LogTarget::File(dir.join(file_name))
        }
        LoggingMode::CustomDirectory(_) | LoggingMode::Default => {
            LogTarget::File(script_dir.join(file_name))
        }
    }
}

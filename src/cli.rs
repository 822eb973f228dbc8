use crate::config::{LoggingMode, SupervisorConfig};
use crate::error::SupervisorError;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// pidkeeper - run a script in the background and track it through a PID file
///
/// The script is launched detached with the given interpreter binary. Its PID
/// is written to `.{script}.pid` next to the script, so later invocations can
/// check on it or stop it.
#[derive(Parser, Debug)]
#[command(
    name = "pidkeeper",
    version = "0.1.0",
    about = "Run a script in the background and track it through a PID file",
    long_about = "Launches a script as a detached background process with the given binary,\n\
                  records its PID in a sentinel file next to the script, and reports on or\n\
                  terminates that process in later invocations."
)]
pub struct Cli {
    /// What to do with the script
    #[arg(value_enum)]
    pub action: Action,

    /// Interpreter used to run the script (e.g. /usr/bin/php, /bin/bash)
    #[arg(short = 'b', long = "binary", value_name = "path")]
    pub binary: PathBuf,

    /// Discard the script's output instead of writing a log file
    #[arg(long = "no-log", conflicts_with = "log_dir")]
    pub no_log: bool,

    /// Directory for `{script}.log` (defaults to the script's directory)
    #[arg(long = "log-dir", value_name = "dir")]
    pub log_dir: Option<PathBuf>,

    /// Treat the whole script reference as a path, without arguments
    #[arg(long = "no-args")]
    pub no_args: bool,

    /// Milliseconds to wait after launch before checking the script survived
    #[arg(long = "grace-ms", value_name = "ms", default_value_t = 5)]
    pub grace_ms: u64,

    /// Milliseconds to wait for the script to exit after SIGTERM
    #[arg(long = "stop-timeout-ms", value_name = "ms", default_value_t = 500)]
    pub stop_timeout_ms: u64,

    /// Clear the PID file as soon as SIGTERM is sent, even if the process survives
    #[arg(long = "clear-before-confirm")]
    pub clear_before_confirm: bool,

    /// Be verbose about what you're doing
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Script path followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub script: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Launch the script unless it is already running
    Start,
    /// Terminate the running script
    Stop,
    /// Report whether the script is running
    Status,
    /// Report if running, otherwise start it
    Run,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Validate the parsed arguments
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.script_reference().trim().is_empty() {
            return Err(SupervisorError::InvalidArguments(
                "No script specified".to_string(),
            ));
        }

        if self.binary.as_os_str().is_empty() {
            return Err(SupervisorError::InvalidArguments(
                "No binary specified".to_string(),
            ));
        }

        Ok(())
    }

    /// Script path and arguments joined back into a single reference
    pub fn script_reference(&self) -> String {
        self.script.join(" ")
    }

    /// Build the supervisor configuration from the flags
    pub fn to_config(&self) -> SupervisorConfig {
        let logging = if self.no_log {
            LoggingMode::Disabled
        } else if let Some(ref dir) = self.log_dir {
            LoggingMode::CustomDirectory(dir.clone())
        } else {
            LoggingMode::Default
        };

        SupervisorConfig::default()
            .with_arguments(!self.no_args)
            .with_logging(logging)
            .with_grace_interval(Duration::from_millis(self.grace_ms))
            .with_stop_timeout(Duration::from_millis(self.stop_timeout_ms))
            .with_clear_before_confirm(self.clear_before_confirm)
    }

    /// Default tracing filter for the verbosity level
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

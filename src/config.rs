use std::path::PathBuf;
use std::time::Duration;

/// Delay between spawning a script and checking that it survived
pub const DEFAULT_GRACE_INTERVAL: Duration = Duration::from_millis(5);

/// How long `stop` waits for a signalled process to disappear
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Spacing between liveness checks while waiting for termination
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Where the supervised script's stdout/stderr should go
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Discard output
    Disabled,
    /// `{script_dir}/{script_name}.log`
    #[default]
    Default,
    /// `{dir}/{script_name}.log`, falling back to `Default` when `dir` is not a directory
    CustomDirectory(PathBuf),
}

impl LoggingMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, LoggingMode::Disabled)
    }
}

/// Supervisor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Split whitespace-separated arguments out of the script reference
    pub enable_arguments: bool,
    pub logging: LoggingMode,
    pub grace_interval: Duration,
    pub stop_timeout: Duration,
    pub poll_interval: Duration,
    /// Clear the PID file right after signalling instead of after the process
    /// is confirmed gone. Matches the older behaviour where a survivor is lost
    /// track of.
    pub clear_before_confirm: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            enable_arguments: true,
            logging: LoggingMode::Default,
            grace_interval: DEFAULT_GRACE_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clear_before_confirm: false,
        }
    }
}

impl SupervisorConfig {
    pub fn with_arguments(mut self, enabled: bool) -> Self {
        self.enable_arguments = enabled;
        self
    }

    pub fn with_logging(mut self, logging: LoggingMode) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_grace_interval(mut self, grace: Duration) -> Self {
        self.grace_interval = grace;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_clear_before_confirm(mut self, enabled: bool) -> Self {
        self.clear_before_confirm = enabled;
        self
    }
}

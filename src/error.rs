use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error kinds, each with a stable numeric code that doubles as the CLI exit code
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoError = 0,
    NotRunning = 1,
    InvalidArguments = 2,
    Initialization = 3,
    Launch = 4,
    Persist = 5,
    CrashedAfterStart = 6,
    Termination = 7,
    AlreadyRunning = 8,
}

impl ErrorKind {
    pub fn as_exit_code(self) -> i32 {
        self as i32
    }
}

/// Main error type for supervisor operations
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Invalid command line arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid script reference: {0}")]
    InvalidScript(String),

    #[error("Supervisor for {0} has not been initialized")]
    NotInitialized(String),

    #[error("Could not initialize {path}: {source}")]
    Initialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not launch script {script}: {source}")]
    Launch {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not save process id {pid}, process was killed: {source}")]
    Persist {
        pid: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("Script {script} died unexpectedly after start (pid {pid})")]
    CrashedAfterStart { script: String, pid: i32 },

    #[error("Process {pid} is still alive after termination signal")]
    Termination { pid: i32 },

    #[error("Script {script} is already running with pid {pid}")]
    AlreadyRunning { script: String, pid: i32 },

    #[error("There's no associated process alive for {0}")]
    NotRunning(String),

    #[error("System error: {0}")]
    SystemError(#[from] nix::Error),
}

impl SupervisorError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            SupervisorError::InvalidScript(_) => ErrorKind::InvalidArguments,
            SupervisorError::NotInitialized(_) => ErrorKind::Initialization,
            SupervisorError::Initialization { .. } => ErrorKind::Initialization,
            SupervisorError::Launch { .. } => ErrorKind::Launch,
            SupervisorError::Persist { .. } => ErrorKind::Persist,
            SupervisorError::CrashedAfterStart { .. } => ErrorKind::CrashedAfterStart,
            SupervisorError::Termination { .. } => ErrorKind::Termination,
            SupervisorError::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            SupervisorError::NotRunning(_) => ErrorKind::NotRunning,
            SupervisorError::SystemError(_) => ErrorKind::Termination,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.kind().as_exit_code()
    }
}

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

impl From<SupervisorError> for i32 {
    fn from(error: SupervisorError) -> Self {
        error.exit_code()
    }
}

/// Snapshot of the most recent failure, kept on the supervisor for callers
/// that only hold a boolean outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: i32,
    pub message: String,
}

impl From<&SupervisorError> for LastError {
    fn from(error: &SupervisorError) -> Self {
        Self {
            code: error.exit_code(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

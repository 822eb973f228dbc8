// Platform-specific compilation guard
#[cfg(not(unix))]
compile_error!("pidkeeper requires a Unix-like operating system. \
                Process detachment and signal delivery rely on POSIX APIs.");

#[cfg(unix)]
pub mod cli;
#[cfg(unix)]
pub mod config;
#[cfg(unix)]
pub mod error;
#[cfg(unix)]
pub mod pidfile;
#[cfg(unix)]
pub mod process;
#[cfg(unix)]
pub mod script;
#[cfg(unix)]
pub mod supervisor;

#[cfg(unix)]
pub use config::{LoggingMode, SupervisorConfig};
#[cfg(unix)]
pub use error::{ErrorKind, LastError, Result, SupervisorError};
#[cfg(unix)]
pub use process::{
    LaunchRequest, NativeProcessControl, ProcessLauncher, ProcessProbe, ProcessTerminator,
};
#[cfg(unix)]
pub use supervisor::{ProcessStatus, ProcessSupervisor, StopOutcome};

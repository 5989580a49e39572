use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::AsyncReadExt as _;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::error::ScanError;
use crate::messages::ScanOutcome;

// How long to wait for the output reader once the worker has exited.
const RESULT_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct ScanCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ScanCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        ScanCommand {
            program: program.into(),
            args,
        }
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct ScanExecutor {
    command: ScanCommand,
}

impl ScanExecutor {
    pub fn new(command: ScanCommand) -> Self {
        ScanExecutor { command }
    }

    /// Starts the scan command as a separate process. Its standard output is
    /// collected by a reader task and delivered as a single message once the
    /// stream closes.
    pub fn spawn(&self) -> Result<ScanWorker, ScanError> {
        debug!("Starting scan worker: {}", self.command.describe());

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScanError::Spawn {
                command: self.command.describe(),
                source,
            })?;

        let (tx, rx) = oneshot::channel();
        if let Some(mut stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut output = Vec::new();
                match stdout.read_to_end(&mut output).await {
                    // Vendor names may not be UTF-8; addresses are plain ASCII.
                    Ok(_) => {
                        let _ = tx.send(String::from_utf8_lossy(&output).into_owned());
                    }
                    Err(err) => warn!("Error reading scan output: {:?}", err),
                }
            });
        }

        Ok(ScanWorker {
            child,
            result: Some(rx),
        })
    }
}

/// Handle on a running scan process.
pub struct ScanWorker {
    child: Child,
    result: Option<oneshot::Receiver<String>>,
}

impl ScanWorker {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking status check. Returns `None` while the process is still
    /// running; once it has exited, returns the outcome (only once).
    pub async fn check(&mut self) -> Option<ScanOutcome> {
        let status = match self.child.try_wait() {
            Ok(None) => return None,
            Ok(Some(status)) => status,
            Err(err) => return Some(ScanOutcome::Failure(ScanError::Wait(err))),
        };

        if !status.success() {
            return Some(ScanOutcome::Failure(ScanError::ExitStatus(status)));
        }

        let Some(rx) = self.result.take() else {
            return Some(ScanOutcome::Failure(ScanError::NoResultReceived));
        };

        match tokio::time::timeout(RESULT_GRACE, rx).await {
            Ok(Ok(output)) => Some(ScanOutcome::Success(output)),
            _ => Some(ScanOutcome::Failure(ScanError::NoResultReceived)),
        }
    }

    /// Best-effort forced termination; failures are logged and swallowed.
    pub fn terminate(&mut self) {
        match self.child.start_kill() {
            Ok(()) => debug!("Terminated scan worker {:?}", self.id()),
            Err(err) => warn!("Failed to terminate scan worker {:?}: {}", self.id(), err),
        }
    }
}

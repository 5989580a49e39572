use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to spawn scan command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to query scan worker status: {0}")]
    Wait(#[source] std::io::Error),
    #[error("scan command exited with {0}")]
    ExitStatus(ExitStatus),
    #[error("no result received from scan worker")]
    NoResultReceived,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to set armed mode on target {target}: {source}")]
    Arming {
        target: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to send notification: {0}")]
    Notification(#[source] anyhow::Error),
}

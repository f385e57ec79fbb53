use thiserror::Error;

use crate::upgrade::UpgradeStep;
use libbackend::Error as BackendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("malformed inspection output at line {line}: '{content}'")]
    InspectionParse { line: usize, content: String },

    #[error("inspection produced no {0} file")]
    MissingInspectionOutput(String),

    #[error("missing required inspection fact '{0}'")]
    MissingFact(&'static str),

    #[error("cannot parse version '{0}'")]
    InvalidVersion(String),

    #[error("refusing to downgrade the database from {current} to {target}")]
    DowngradeRejected { current: String, target: String },

    #[error("upgrade step {step} failed")]
    HelperContainerFailed {
        step: UpgradeStep,
        #[source]
        source: BackendError,
    },

    /// Raised when the deferred restart itself fails. The step error that
    /// preceded it, if any, is carried along: the service being down is the
    /// more urgent operational fact, but neither error is swallowed.
    #[error("failed to restart the server service: {restart}")]
    RestartFailed {
        restart: BackendError,
        step_error: Option<Box<Error>>,
    },

    #[error("invalid image reference '{0}'")]
    InvalidImage(String),

    #[error("cannot read host configuration: {0}")]
    HostConfig(String),

    #[error("no SSH agent socket, set SSH_AUTH_SOCK or pass --ssh-auth-socket")]
    NoSshAgent,

    #[error("ssh agent socket '{0}' is not inside an absolute directory")]
    InvalidSshSocket(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no running hub server instance detected")]
    NoInstanceFound,

    #[error("no deployment found, specify the backend explicitly")]
    NoBackendDetected,

    #[error("unknown backend '{0}', expected podman or kubernetes")]
    UnknownBackend(String),

    #[error("unknown pull policy '{0}', expected always, ifmissing or never")]
    UnknownPullPolicy(String),

    #[error("{program} failed: {detail}")]
    CommandFailed { program: String, detail: String },

    #[error("cannot pull image {image}: {detail}")]
    ImagePullFailed { image: String, detail: String },

    #[error("helper container {name} failed")]
    HelperContainerFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("cannot {action} the server service")]
    ServiceControlFailed {
        action: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

/// The two ways the hub server can be deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Podman,
    Kubernetes,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Podman => write!(f, "podman"),
            BackendKind::Kubernetes => write!(f, "kubernetes"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "podman" => Ok(BackendKind::Podman),
            // kubectl is accepted for compatibility with the backend flag values
            "kubernetes" | "kubectl" => Ok(BackendKind::Kubernetes),
            other => Err(Error::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPolicy {
    Always,
    IfMissing,
    Never,
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullPolicy::Always => write!(f, "always"),
            PullPolicy::IfMissing => write!(f, "ifmissing"),
            PullPolicy::Never => write!(f, "never"),
        }
    }
}

impl FromStr for PullPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "always" => Ok(PullPolicy::Always),
            "ifmissing" | "if-missing" | "missing" => Ok(PullPolicy::IfMissing),
            "never" => Ok(PullPolicy::Never),
            other => Err(Error::UnknownPullPolicy(other.to_string())),
        }
    }
}

/// Credentials used to pull images from an authenticated registry.
#[derive(Debug, Clone)]
pub struct RegistryCreds {
    pub username: String,
    pub password: String,
}

/// A host path bound into a helper container.
#[derive(Debug, Clone)]
pub struct Bind {
    pub host: PathBuf,
    pub container: PathBuf,
    pub read_only: bool,
}

impl Bind {
    pub fn new(host: impl AsRef<Path>, container: impl AsRef<Path>) -> Self {
        Bind {
            host: host.as_ref().to_path_buf(),
            container: container.as_ref().to_path_buf(),
            read_only: false,
        }
    }

    pub fn read_only(host: impl AsRef<Path>, container: impl AsRef<Path>) -> Self {
        Bind {
            read_only: true,
            ..Bind::new(host, container)
        }
    }
}

/// Everything the orchestration engine needs from a deployment backend.
///
/// The two implementations are [`crate::podman::PodmanDriver`] for the
/// single-container deployment and [`crate::kubernetes::KubernetesDriver`]
/// for the orchestrated pod. Callers program against this trait only.
pub trait BackendDriver {
    fn kind(&self) -> BackendKind;

    /// Look up the running server instance, if any. Safe to call from a
    /// dry-run: this is a read-only probe.
    fn detect_running_instance(&self) -> Result<Option<String>, Error>;

    /// Execute a command inside the live instance and return its stdout.
    fn run_command(&self, command: &str, args: &[&str]) -> Result<String, Error>;

    /// Copy a file between the host and the instance. Paths prefixed with
    /// `server:` designate the instance side.
    fn copy_file(&self, src: &str, dst: &str, owner: &str, group: &str) -> Result<(), Error>;

    fn path_exists(&self, path: &str) -> bool;

    /// Make sure the image is available locally, honoring the pull policy,
    /// and return the reference to use for running containers.
    fn prepare_image(
        &self,
        image: &str,
        policy: PullPolicy,
        creds: Option<&RegistryCreds>,
    ) -> Result<String, Error>;

    /// Run a one-shot helper container to completion and remove it.
    fn run_helper_container(
        &self,
        name: &str,
        image: &str,
        binds: &[Bind],
        command: &[String],
    ) -> Result<(), Error>;

    fn stop_service(&self) -> Result<(), Error>;
    fn start_service(&self) -> Result<(), Error>;
    fn reload_service_manager(&self) -> Result<(), Error>;

    /// Persist the image reference the service will run on next start.
    fn update_service_image(&self, image: &str) -> Result<(), Error>;
}

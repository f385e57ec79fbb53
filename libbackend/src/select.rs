use crate::driver::{BackendDriver, BackendKind};
use crate::error::Error;
use crate::kubernetes::KubernetesDriver;
use crate::podman::PodmanDriver;

/// Decide which backend to use.
///
/// An explicit choice always wins, even when that backend has nothing
/// running: later calls will fail naturally instead of silently falling
/// back. Without an explicit choice, podman is checked before kubernetes;
/// when both have a running instance podman wins.
pub fn pick(
    explicit: Option<BackendKind>,
    podman_running: bool,
    kubernetes_running: bool,
) -> Result<BackendKind, Error> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }
    if podman_running {
        return Ok(BackendKind::Podman);
    }
    if kubernetes_running {
        return Ok(BackendKind::Kubernetes);
    }
    Err(Error::NoBackendDetected)
}

pub fn driver_for(kind: BackendKind) -> Box<dyn BackendDriver> {
    match kind {
        BackendKind::Podman => Box::new(PodmanDriver::new()),
        BackendKind::Kubernetes => Box::new(KubernetesDriver::new()),
    }
}

/// Resolve a driver from an optional explicit backend, probing for a
/// running instance when none is given. The probes are read-only.
pub fn choose_backend(explicit: Option<BackendKind>) -> Result<Box<dyn BackendDriver>, Error> {
    let kind = match explicit {
        Some(kind) => kind,
        None => {
            let podman = probe(&PodmanDriver::new());
            let kubernetes = probe(&KubernetesDriver::new());
            let kind = pick(None, podman, kubernetes)?;
            tracing::debug!("auto-detected {kind} backend");
            kind
        }
    };
    Ok(driver_for(kind))
}

fn probe(driver: &dyn BackendDriver) -> bool {
    matches!(driver.detect_running_instance(), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_wins_even_without_instance() {
        let kind = pick(Some(BackendKind::Kubernetes), true, false).unwrap();
        assert_eq!(kind, BackendKind::Kubernetes);
    }

    #[test]
    fn test_podman_checked_first() {
        assert_eq!(pick(None, true, true).unwrap(), BackendKind::Podman);
        assert_eq!(pick(None, true, false).unwrap(), BackendKind::Podman);
        assert_eq!(pick(None, false, true).unwrap(), BackendKind::Kubernetes);
    }

    #[test]
    fn test_nothing_running() {
        assert!(matches!(
            pick(None, false, false),
            Err(Error::NoBackendDetected)
        ));
    }

    #[test]
    fn test_backend_kind_parsing() {
        use std::str::FromStr;
        assert_eq!(BackendKind::from_str("podman").unwrap(), BackendKind::Podman);
        assert_eq!(
            BackendKind::from_str("kubectl").unwrap(),
            BackendKind::Kubernetes
        );
        assert!(matches!(
            BackendKind::from_str("docker"),
            Err(Error::UnknownBackend(_))
        ));
    }
}

use std::path::PathBuf;

use serde::Deserialize;

use libbackend::RegistryCreds;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hubadm/config.yaml";

/// Optional host-side configuration. Everything in here is opportunistic:
/// a missing file is not an error, only a malformed one is.
#[derive(Debug, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub registry: Option<RegistryAuth>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
}

impl From<RegistryAuth> for RegistryCreds {
    fn from(auth: RegistryAuth) -> Self {
        RegistryCreds {
            username: auth.username,
            password: auth.password,
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var("HUBADM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load() -> Result<HostConfig> {
    let path = config_path();
    if !path.exists() {
        return Ok(HostConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&content).map_err(|e| Error::HostConfig(e.to_string()))
}

/// Registry credentials from the host configuration, if any. Never
/// required: a broken configuration is only worth a warning here.
pub fn registry_creds() -> Option<RegistryCreds> {
    match load() {
        Ok(config) => config.registry.map(RegistryCreds::from),
        Err(e) => {
            tracing::warn!("ignoring host configuration: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_missing_config_is_not_an_error() {
        unsafe { std::env::set_var("HUBADM_CONFIG", "/nonexistent/hubadm.yaml") };
        let config = load().unwrap();
        assert!(config.registry.is_none());
        unsafe { std::env::remove_var("HUBADM_CONFIG") };
    }

    #[test]
    #[serial]
    fn test_load_registry_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "registry:\n  username: orga\n  password: secret\ntimezone: Europe/Berlin"
        )
        .unwrap();
        unsafe { std::env::set_var("HUBADM_CONFIG", file.path()) };

        let config = load().unwrap();
        let auth = config.registry.unwrap();
        assert_eq!(auth.username, "orga");
        assert_eq!(auth.password, "secret");
        assert_eq!(config.timezone.as_deref(), Some("Europe/Berlin"));

        let creds = registry_creds().unwrap();
        assert_eq!(creds.username, "orga");

        unsafe { std::env::remove_var("HUBADM_CONFIG") };
    }

    #[test]
    #[serial]
    fn test_malformed_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "registry: [not a mapping").unwrap();
        unsafe { std::env::set_var("HUBADM_CONFIG", file.path()) };

        assert!(matches!(load(), Err(Error::HostConfig(_))));
        // but the opportunistic reader shrugs it off
        assert!(registry_creds().is_none());

        unsafe { std::env::remove_var("HUBADM_CONFIG") };
    }
}

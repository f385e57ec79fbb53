use std::fs;
use std::path::Path;

use crate::cmd;
use crate::driver::{BackendDriver, BackendKind, Bind, PullPolicy, RegistryCreds};
use crate::error::Error;

/// Name of the server container and of its systemd unit.
pub const SERVER_CONTAINER: &str = "hub-server";
pub const SERVER_SERVICE: &str = "hub-server";

const SERVICE_DROPIN_DIR: &str = "/etc/systemd/system/hub-server.service.d";

/// Single-container deployment driven through podman and systemd.
pub struct PodmanDriver {
    container: String,
}

impl PodmanDriver {
    pub fn new() -> Self {
        PodmanDriver {
            container: SERVER_CONTAINER.to_string(),
        }
    }

    fn resolve_path(&self, spec: &str) -> String {
        match spec.strip_prefix("server:") {
            Some(path) => format!("{}:{}", self.container, path),
            None => spec.to_string(),
        }
    }

    fn image_present(&self, image: &str) -> bool {
        cmd::output("podman", &["images", "-q", image])
            .map(|out| !out.is_empty())
            .unwrap_or(false)
    }

    fn pull(&self, image: &str, creds: Option<&RegistryCreds>) -> Result<(), Error> {
        let mut args = vec!["pull"];
        let creds_arg;
        if let Some(creds) = creds {
            creds_arg = format!("{}:{}", creds.username, creds.password);
            args.push("--creds");
            args.push(&creds_arg);
        }
        args.push(image);

        tracing::info!("Pulling image {image}");
        cmd::run("podman", &args).map_err(|e| Error::ImagePullFailed {
            image: image.to_string(),
            detail: e.to_string(),
        })
    }

    fn systemctl(&self, action: &'static str, args: &[&str]) -> Result<(), Error> {
        cmd::run("systemctl", args).map_err(|e| Error::ServiceControlFailed {
            action,
            source: Box::new(e),
        })
    }
}

impl Default for PodmanDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendDriver for PodmanDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Podman
    }

    fn detect_running_instance(&self) -> Result<Option<String>, Error> {
        let filter = format!("name={}", self.container);
        let out = cmd::output("podman", &["ps", "-q", "--filter", &filter])?;
        Ok((!out.is_empty()).then(|| self.container.clone()))
    }

    fn run_command(&self, command: &str, args: &[&str]) -> Result<String, Error> {
        let mut podman_args = vec!["exec", self.container.as_str(), command];
        podman_args.extend_from_slice(args);
        cmd::output("podman", &podman_args)
    }

    fn copy_file(&self, src: &str, dst: &str, owner: &str, group: &str) -> Result<(), Error> {
        cmd::run("podman", &["cp", &self.resolve_path(src), &self.resolve_path(dst)])?;

        if let Some(path) = dst.strip_prefix("server:")
            && !owner.is_empty()
        {
            let ownership = format!("{owner}:{group}");
            self.run_command("chown", &[&ownership, path])?;
        }
        Ok(())
    }

    fn path_exists(&self, path: &str) -> bool {
        self.run_command("test", &["-e", path]).is_ok()
    }

    fn prepare_image(
        &self,
        image: &str,
        policy: PullPolicy,
        creds: Option<&RegistryCreds>,
    ) -> Result<String, Error> {
        match policy {
            PullPolicy::Always => self.pull(image, creds)?,
            PullPolicy::IfMissing => {
                if self.image_present(image) {
                    tracing::debug!("image {image} already present");
                } else {
                    self.pull(image, creds)?;
                }
            }
            PullPolicy::Never => {
                if !self.image_present(image) {
                    return Err(Error::ImagePullFailed {
                        image: image.to_string(),
                        detail: "image not present and pull policy is never".to_string(),
                    });
                }
            }
        }
        Ok(image.to_string())
    }

    fn run_helper_container(
        &self,
        name: &str,
        image: &str,
        binds: &[Bind],
        command: &[String],
    ) -> Result<(), Error> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            name.into(),
            "--security-opt".into(),
            "label=disable".into(),
        ];
        for bind in binds {
            let suffix = if bind.read_only { ":ro" } else { "" };
            args.push("-v".into());
            args.push(format!(
                "{}:{}{}",
                bind.host.display(),
                bind.container.display(),
                suffix
            ));
        }
        args.push(image.into());
        args.extend(command.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd::run("podman", &arg_refs).map_err(|e| Error::HelperContainerFailed {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    fn stop_service(&self) -> Result<(), Error> {
        self.systemctl("stop", &["stop", SERVER_SERVICE])
    }

    fn start_service(&self) -> Result<(), Error> {
        self.systemctl("start", &["start", SERVER_SERVICE])
    }

    fn reload_service_manager(&self) -> Result<(), Error> {
        self.systemctl("reload", &["daemon-reload"])
    }

    fn update_service_image(&self, image: &str) -> Result<(), Error> {
        let dir = Path::new(SERVICE_DROPIN_DIR);
        fs::create_dir_all(dir)?;
        let conf = format!("[Service]\nEnvironment=HUB_IMAGE={image}\n");
        fs::write(dir.join("image.conf"), conf)?;
        tracing::info!("Service image set to {image}");
        Ok(())
    }
}

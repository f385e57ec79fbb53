use serde_json::json;

use crate::cmd;
use crate::driver::{BackendDriver, BackendKind, Bind, PullPolicy, RegistryCreds};
use crate::error::Error;

/// Label selecting the server pod.
pub const SERVER_SELECTOR: &str = "app=hub-server";
pub const SERVER_DEPLOYMENT: &str = "hub-server";

/// Orchestrated-pod deployment driven through kubectl.
///
/// The server runs as a single-replica deployment; stop and start scale
/// the replica count rather than touching the pod directly.
pub struct KubernetesDriver {
    selector: String,
    namespace: String,
}

impl KubernetesDriver {
    pub fn new() -> Self {
        KubernetesDriver {
            selector: SERVER_SELECTOR.to_string(),
            namespace: "default".to_string(),
        }
    }

    fn running_pod(&self) -> Result<String, Error> {
        self.detect_running_instance()?.ok_or(Error::NoInstanceFound)
    }

    fn resolve_path(&self, spec: &str, pod: &str) -> String {
        match spec.strip_prefix("server:") {
            Some(path) => format!("{}/{}:{}", self.namespace, pod, path),
            None => spec.to_string(),
        }
    }

    fn scale_to(&self, action: &'static str, replicas: u32) -> Result<(), Error> {
        let replicas_arg = format!("--replicas={replicas}");
        cmd::run(
            "kubectl",
            &[
                "scale",
                "deployment",
                SERVER_DEPLOYMENT,
                "-n",
                &self.namespace,
                &replicas_arg,
            ],
        )
        .map_err(|e| Error::ServiceControlFailed {
            action,
            source: Box::new(e),
        })
    }
}

impl Default for KubernetesDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendDriver for KubernetesDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Kubernetes
    }

    fn detect_running_instance(&self) -> Result<Option<String>, Error> {
        let result = cmd::output(
            "kubectl",
            &[
                "get",
                "pod",
                "-n",
                &self.namespace,
                "-l",
                &self.selector,
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ],
        );
        // An unreachable cluster counts as no instance for detection purposes.
        match result {
            Ok(out) => Ok(out.split_whitespace().next().map(String::from)),
            Err(e) => {
                tracing::debug!("kubectl probe failed: {e}");
                Ok(None)
            }
        }
    }

    fn run_command(&self, command: &str, args: &[&str]) -> Result<String, Error> {
        let pod = self.running_pod()?;
        let mut kubectl_args = vec!["exec", "-n", self.namespace.as_str(), pod.as_str(), "--", command];
        kubectl_args.extend_from_slice(args);
        cmd::output("kubectl", &kubectl_args)
    }

    fn copy_file(&self, src: &str, dst: &str, owner: &str, group: &str) -> Result<(), Error> {
        let pod = self.running_pod()?;
        cmd::run(
            "kubectl",
            &[
                "cp",
                &self.resolve_path(src, &pod),
                &self.resolve_path(dst, &pod),
            ],
        )?;

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
        _policy: PullPolicy,
        _creds: Option<&RegistryCreds>,
    ) -> Result<String, Error> {
        // The kubelet pulls images itself; credentials come from the
        // cluster's pull secrets.
        tracing::debug!("image pull for {image} delegated to the cluster");
        Ok(image.to_string())
    }

    fn run_helper_container(
        &self,
        name: &str,
        image: &str,
        binds: &[Bind],
        command: &[String],
    ) -> Result<(), Error> {
        let volumes: Vec<serde_json::Value> = binds
            .iter()
            .enumerate()
            .map(|(i, bind)| {
                json!({
                    "name": format!("bind-{i}"),
                    "hostPath": {"path": bind.host.display().to_string()},
                })
            })
            .collect();
        let mounts: Vec<serde_json::Value> = binds
            .iter()
            .enumerate()
            .map(|(i, bind)| {
                json!({
                    "name": format!("bind-{i}"),
                    "mountPath": bind.container.display().to_string(),
                    "readOnly": bind.read_only,
                })
            })
            .collect();
        let overrides = json!({
            "apiVersion": "v1",
            "spec": {
                "restartPolicy": "Never",
                "containers": [{
                    "name": name,
                    "image": image,
                    "command": command,
                    "volumeMounts": mounts,
                }],
                "volumes": volumes,
            },
        })
        .to_string();

        cmd::run(
            "kubectl",
            &[
                "run",
                name,
                "-n",
                &self.namespace,
                "--attach",
                "--rm",
                "--restart=Never",
                "--image",
                image,
                "--overrides",
                &overrides,
            ],
        )
        .map_err(|e| Error::HelperContainerFailed {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    fn stop_service(&self) -> Result<(), Error> {
        self.scale_to("stop", 0)
    }

    fn start_service(&self) -> Result<(), Error> {
        // Scaling up an already-running deployment is pointless churn.
        if self.detect_running_instance()?.is_some() {
            tracing::debug!("server pod already running");
            return Ok(());
        }
        self.scale_to("start", 1)
    }

    fn reload_service_manager(&self) -> Result<(), Error> {
        // No unit files to reload: the deployment picks up changes itself.
        Ok(())
    }

    fn update_service_image(&self, image: &str) -> Result<(), Error> {
        let target = format!("deployment/{SERVER_DEPLOYMENT}");
        let container_image = format!("{SERVER_DEPLOYMENT}={image}");
        cmd::run(
            "kubectl",
            &["set", "image", &target, &container_image, "-n", &self.namespace],
        )?;
        tracing::info!("Service image set to {image}");
        Ok(())
    }
}

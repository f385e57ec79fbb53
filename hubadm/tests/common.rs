use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use libbackend::{
    BackendDriver, BackendKind, Bind, Error as BackendError, PullPolicy, RegistryCreds,
};

/// A recording backend driver. Helper containers are simulated by writing
/// the expected output files into the mounted bundle directory, so the
/// real inspection and migration pipelines run end to end.
pub struct MockDriver {
    pub kind: BackendKind,
    pub instance: Option<String>,
    pub calls: Rc<RefCell<Vec<String>>>,
    pub scripts: Rc<RefCell<Vec<(String, String)>>>,
    pub fail_helper: Option<String>,
    pub fail_start: bool,
    pub image_facts: String,
    pub instance_facts: String,
    pub migration_facts: String,
}

impl MockDriver {
    pub fn new() -> Self {
        MockDriver {
            kind: BackendKind::Podman,
            instance: Some("hub-server".to_string()),
            calls: Rc::new(RefCell::new(Vec::new())),
            scripts: Rc::new(RefCell::new(Vec::new())),
            fail_helper: None,
            fail_start: false,
            image_facts: "image_db_version=16\nimage_release=2025.2\n".to_string(),
            instance_facts: "current_db_version=14\ncurrent_release=2024.8\n".to_string(),
            migration_facts:
                "timezone=Europe/Berlin\nsource_db_version=14\ntarget_db_version=16\n".to_string(),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendDriver for MockDriver {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn detect_running_instance(&self) -> Result<Option<String>, BackendError> {
        self.record("detect");
        Ok(self.instance.clone())
    }

    fn run_command(&self, command: &str, _args: &[&str]) -> Result<String, BackendError> {
        self.record(format!("exec:{command}"));
        if command == "cat" {
            return Ok(self.instance_facts.clone());
        }
        Ok(String::new())
    }

    fn copy_file(
        &self,
        _src: &str,
        _dst: &str,
        _owner: &str,
        _group: &str,
    ) -> Result<(), BackendError> {
        self.record("copy");
        Ok(())
    }

    fn path_exists(&self, _path: &str) -> bool {
        true
    }

    fn prepare_image(
        &self,
        image: &str,
        _policy: PullPolicy,
        _creds: Option<&RegistryCreds>,
    ) -> Result<String, BackendError> {
        self.record(format!("prepare:{image}"));
        Ok(image.to_string())
    }

    fn run_helper_container(
        &self,
        name: &str,
        _image: &str,
        binds: &[Bind],
        command: &[String],
    ) -> Result<(), BackendError> {
        self.record(format!("helper:{name}"));

        // the first bind is always the script bundle
        let bundle_dir = &binds[0].host;
        if let Some(script_name) = command
            .first()
            .and_then(|path| path.rsplit('/').next())
            && let Ok(content) = fs::read_to_string(bundle_dir.join(script_name))
        {
            self.scripts
                .borrow_mut()
                .push((name.to_string(), content));
        }

        if self.fail_helper.as_deref() == Some(name) {
            return Err(BackendError::HelperContainerFailed {
                name: name.to_string(),
                source: Box::new(BackendError::CommandFailed {
                    program: "podman".to_string(),
                    detail: "exit status: 1".to_string(),
                }),
            });
        }

        match name {
            "hub-inspect" => fs::write(bundle_dir.join("inspect.out"), &self.image_facts).unwrap(),
            "hub-migration" => {
                fs::write(bundle_dir.join("migration.out"), &self.migration_facts).unwrap()
            }
            _ => {}
        }
        Ok(())
    }

    fn stop_service(&self) -> Result<(), BackendError> {
        self.record("stop");
        Ok(())
    }

    fn start_service(&self) -> Result<(), BackendError> {
        self.record("start");
        if self.fail_start {
            return Err(BackendError::ServiceControlFailed {
                action: "start",
                source: Box::new(BackendError::CommandFailed {
                    program: "systemctl".to_string(),
                    detail: "exit status: 1".to_string(),
                }),
            });
        }
        Ok(())
    }

    fn reload_service_manager(&self) -> Result<(), BackendError> {
        self.record("reload");
        Ok(())
    }

    fn update_service_image(&self, image: &str) -> Result<(), BackendError> {
        self.record(format!("set-image:{image}"));
        Ok(())
    }
}

pub fn count(calls: &[String], name: &str) -> usize {
    calls.iter().filter(|call| call.as_str() == name).count()
}

use crate::driver::{BackendDriver, BackendKind};
use crate::error::Error;
use crate::select;

/// A backend-agnostic handle on the running server instance.
///
/// The connection is bound to one driver at construction time and adds no
/// behavior of its own: it exists so the orchestration layers can be
/// written once against a single surface.
pub struct Connection {
    driver: Box<dyn BackendDriver>,
    target: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.driver.kind())
            .field("target", &self.target)
            .finish()
    }
}

impl Connection {
    /// Resolve the backend (explicit flag or auto-detection) and bind to
    /// the running instance. Fails with [`Error::NoInstanceFound`] when the
    /// chosen backend has no instance: an explicit choice never falls back
    /// to the other backend.
    pub fn new(explicit: Option<BackendKind>) -> Result<Self, Error> {
        let driver = select::choose_backend(explicit)?;
        Self::bind(driver)
    }

    /// Bind to an already-chosen driver.
    pub fn bind(driver: Box<dyn BackendDriver>) -> Result<Self, Error> {
        let target = driver
            .detect_running_instance()?
            .ok_or(Error::NoInstanceFound)?;
        tracing::debug!("connected to {} instance {target}", driver.kind());
        Ok(Connection { driver, target })
    }

    pub fn backend(&self) -> BackendKind {
        self.driver.kind()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn driver(&self) -> &dyn BackendDriver {
        self.driver.as_ref()
    }

    pub fn exec(&self, command: &str, args: &[&str]) -> Result<String, Error> {
        self.driver.run_command(command, args)
    }

    pub fn copy(&self, src: &str, dst: &str, owner: &str, group: &str) -> Result<(), Error> {
        self.driver.copy_file(src, dst, owner, group)
    }

    pub fn path_exists(&self, path: &str) -> bool {
        self.driver.path_exists(path)
    }
}

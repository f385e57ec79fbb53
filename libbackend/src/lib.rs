pub mod cmd;
pub mod connection;
pub mod driver;
pub mod error;
pub mod kubernetes;
pub mod podman;
pub mod select;

pub use connection::Connection;
pub use driver::{BackendDriver, BackendKind, Bind, PullPolicy, RegistryCreds};
pub use error::Error;
pub use kubernetes::KubernetesDriver;
pub use podman::PodmanDriver;
pub use select::{choose_backend, driver_for};

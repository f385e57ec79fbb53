use libbackend::{BackendDriver, BackendKind, Connection, PullPolicy, select};

use crate::error::Result;
use crate::image::{ImageFlags, compute_image};
use crate::inspect;
use crate::migrate::{self, MigrateFlags};
use crate::upgrade;

/// Inspect a candidate image, or the deployed instance when no image is
/// given, and print the facts as JSON.
pub fn inspect_cmd(
    backend: Option<BackendKind>,
    image: Option<String>,
    tag: &str,
    pull_policy: PullPolicy,
) -> Result<()> {
    let facts = match image {
        Some(name) => {
            // image inspection needs a driver but no live deployment
            let server_image = compute_image(&name, tag, &[])?;
            let driver = inspect_driver(backend);
            inspect::inspect_image(driver.as_ref(), &server_image, pull_policy)?
        }
        None => inspect::inspect_instance(&Connection::new(backend)?)?,
    };
    println!("{}", serde_json::to_string_pretty(&facts)?);
    Ok(())
}

/// Driver used for image inspection: the explicit choice, otherwise the
/// backend of a running deployment, otherwise podman.
pub fn inspect_driver(backend: Option<BackendKind>) -> Box<dyn BackendDriver> {
    match backend {
        Some(kind) => select::driver_for(kind),
        None => select::choose_backend(None)
            .unwrap_or_else(|_| select::driver_for(BackendKind::Podman)),
    }
}

pub fn upgrade_cmd(
    backend: Option<BackendKind>,
    image: ImageFlags,
    migration_image: Option<ImageFlags>,
) -> Result<()> {
    let cnx = Connection::new(backend)?;
    upgrade::upgrade(&cnx, &image, migration_image.as_ref())?;
    tracing::info!("Server upgraded successfully");
    Ok(())
}

pub fn migrate_cmd(
    backend: Option<BackendKind>,
    image: ImageFlags,
    migration_image: Option<ImageFlags>,
    flags: MigrateFlags,
) -> Result<()> {
    // migration targets a fresh deployment, so there is nothing to detect
    let driver = select::driver_for(backend.unwrap_or(BackendKind::Podman));
    let data = migrate::migrate(driver.as_ref(), &image, migration_image.as_ref(), &flags)?;
    tracing::info!(
        "Migration from {} complete (timezone {})",
        flags.source_host,
        data.timezone
    );
    Ok(())
}

pub fn start_cmd(backend: Option<BackendKind>) -> Result<()> {
    let driver = select::choose_backend(backend)?;
    driver.start_service()?;
    Ok(())
}

pub fn stop_cmd(backend: Option<BackendKind>) -> Result<()> {
    let driver = select::choose_backend(backend)?;
    driver.stop_service()?;
    Ok(())
}

pub fn restart_cmd(backend: Option<BackendKind>) -> Result<()> {
    let driver = select::choose_backend(backend)?;
    driver.stop_service()?;
    driver.start_service()?;
    Ok(())
}

use std::path::PathBuf;

use libbackend::{BackendDriver, Bind};

use crate::bundle::{self, ScriptBundle};
use crate::error::{Error, Result};
use crate::facts::Facts;
use crate::hostinfo;
use crate::image::{ImageFlags, compute_image};
use crate::upgrade::{self, UpgradePlan};

pub const MIGRATION_CONTAINER: &str = "hub-migration";

#[derive(Debug, Clone)]
pub struct MigrateFlags {
    pub source_host: String,
    pub user: String,
    pub ssh_auth_socket: PathBuf,
    pub ssh_config: Option<PathBuf>,
    pub ssh_known_hosts: Option<PathBuf>,
}

/// The facts a migration run extracts from the remote deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationData {
    pub timezone: String,
    pub source_db_version: String,
    pub target_db_version: String,
}

/// Pull an existing remote deployment's data into a fresh container and
/// report the extracted facts.
///
/// The SSH agent socket is baked into the generated script and its
/// directory mounted into the helper container; ssh configuration and
/// known-hosts files are mounted read-only when given.
pub fn run_migration(
    driver: &dyn BackendDriver,
    image: &ImageFlags,
    flags: &MigrateFlags,
) -> Result<MigrationData> {
    // the socket directory is mounted into the helper container, so it
    // must be a real absolute directory, never the filesystem root
    let socket_dir = flags
        .ssh_auth_socket
        .parent()
        .filter(|dir| dir.is_absolute() && dir.parent().is_some())
        .ok_or_else(|| Error::InvalidSshSocket(flags.ssh_auth_socket.display().to_string()))?;

    let server_image = compute_image(&image.name, &image.tag, &[])?;
    let creds = hostinfo::registry_creds();
    let prepared = driver.prepare_image(&server_image, image.pull_policy, creds.as_ref())?;

    let bundle = ScriptBundle::new()?;
    bundle.write_script(
        bundle::MIGRATION_SCRIPT,
        &bundle::migration_script(
            &flags.source_host,
            &flags.user,
            &flags.ssh_auth_socket.to_string_lossy(),
        ),
    )?;

    let mut binds = vec![bundle.bind()];
    binds.push(Bind::new(socket_dir, socket_dir));
    if let Some(config) = &flags.ssh_config {
        binds.push(Bind::read_only(config, "/tmp/ssh_config"));
    }
    if let Some(known_hosts) = &flags.ssh_known_hosts {
        binds.push(Bind::read_only(known_hosts, "/etc/ssh/ssh_known_hosts"));
    }

    tracing::info!("Migrating the server from {}", flags.source_host);
    driver.run_helper_container(
        MIGRATION_CONTAINER,
        &prepared,
        &binds,
        &[ScriptBundle::container_path(bundle::MIGRATION_SCRIPT)],
    )?;

    let raw = bundle.read_output(bundle::MIGRATION_OUTPUT)?;
    let facts = Facts::parse(&raw)?;
    Ok(MigrationData {
        timezone: facts.require("timezone")?.to_string(),
        source_db_version: facts.require("source_db_version")?.to_string(),
        target_db_version: facts.require("target_db_version")?.to_string(),
    })
}

/// Full remote-to-container migration: extract the data, then hand the
/// detected versions to the same planning and sequencing core the in-place
/// upgrade uses, and finally bring the migrated service up.
pub fn migrate(
    driver: &dyn BackendDriver,
    image: &ImageFlags,
    migration_image: Option<&ImageFlags>,
    flags: &MigrateFlags,
) -> Result<MigrationData> {
    let data = run_migration(driver, image, flags)?;
    tracing::info!(
        "Migrated data uses database {} (timezone {}), target provides {}",
        data.source_db_version,
        data.timezone,
        data.target_db_version
    );

    // a freshly migrated database always needs its schema brought up to date
    let plan = UpgradePlan::from_versions(&data.source_db_version, &data.target_db_version, true)?;

    let server_image = compute_image(&image.name, &image.tag, &[])?;
    upgrade::run_upgrade_steps(driver, &server_image, image, migration_image, &plan)?;

    driver.update_service_image(&server_image)?;
    driver.reload_service_manager()?;
    driver.start_service()?;
    Ok(data)
}

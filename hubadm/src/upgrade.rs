use std::fmt;

use libbackend::{BackendDriver, Connection, Error as BackendError};

use crate::bundle::{self, ScriptBundle};
use crate::error::{Error, Result};
use crate::facts::Facts;
use crate::hostinfo;
use crate::image::{ImageFlags, compute_image};
use crate::inspect;

pub const DB_UPGRADE_CONTAINER: &str = "hub-db-upgrade";
pub const DB_FINALIZE_CONTAINER: &str = "hub-db-finalize";
pub const POST_UPGRADE_CONTAINER: &str = "hub-post-upgrade";

/// The mutation steps of an upgrade run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStep {
    DbMigrating,
    Finalizing,
    PostUpgrading,
    Restarting,
}

impl fmt::Display for UpgradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeStep::DbMigrating => write!(f, "database migration"),
            UpgradeStep::Finalizing => write!(f, "database finalization"),
            UpgradeStep::PostUpgrading => write!(f, "post-upgrade"),
            UpgradeStep::Restarting => write!(f, "restart"),
        }
    }
}

/// The decision record of one upgrade run, computed once from inspected
/// facts and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    pub requires_db_major_upgrade: bool,
    pub requires_schema_update: bool,
    pub current_db_version: String,
    pub image_db_version: String,
}

impl UpgradePlan {
    /// Derive the plan from inspected facts. Both version keys are
    /// required; their absence is a hard error, never a default.
    pub fn compute(facts: &Facts) -> Result<Self> {
        let current = facts.require("current_db_version")?;
        let image = facts.require("image_db_version")?;
        let releases_differ = match (facts.get("current_release"), facts.get("image_release")) {
            (Some(current_release), Some(image_release)) => current_release != image_release,
            // a missing release identifier on either side counts as differing
            _ => true,
        };
        Self::from_versions(current, image, releases_differ)
    }

    /// Derive the plan from bare version tokens, as the remote migration
    /// path does. Versions compare numerically on their major component,
    /// not lexically.
    pub fn from_versions(current: &str, image: &str, releases_differ: bool) -> Result<Self> {
        let current_major = version_major(current)?;
        let image_major = version_major(image)?;

        if image_major < current_major {
            return Err(Error::DowngradeRejected {
                current: current.to_string(),
                target: image.to_string(),
            });
        }

        let requires_db_major_upgrade = image_major > current_major;
        Ok(UpgradePlan {
            requires_db_major_upgrade,
            requires_schema_update: requires_db_major_upgrade || releases_differ,
            current_db_version: current.to_string(),
            image_db_version: image.to_string(),
        })
    }
}

pub(crate) fn version_major(version: &str) -> Result<u32> {
    version
        .trim()
        .split('.')
        .next()
        .and_then(|major| major.parse().ok())
        .ok_or_else(|| Error::InvalidVersion(version.to_string()))
}

/// The stopped server service, restarted on every exit path.
///
/// The normal path calls [`StoppedService::restart`] so the error is
/// observable; `Drop` is the backstop for early returns and panics and can
/// only log. Restarting twice is a no-op.
pub struct StoppedService<'a> {
    driver: &'a dyn BackendDriver,
    restarted: bool,
}

impl<'a> StoppedService<'a> {
    pub fn stop(driver: &'a dyn BackendDriver) -> Result<Self> {
        tracing::info!("Stopping the server service");
        driver.stop_service()?;
        Ok(StoppedService {
            driver,
            restarted: false,
        })
    }

    pub fn restart(&mut self) -> std::result::Result<(), BackendError> {
        if self.restarted {
            return Ok(());
        }
        self.restarted = true;
        tracing::info!("Restarting the server service");
        self.driver.start_service()
    }
}

impl Drop for StoppedService<'_> {
    fn drop(&mut self) {
        if !self.restarted
            && let Err(e) = self.driver.start_service()
        {
            tracing::error!("failed to restart the server service: {e}");
        }
    }
}

fn resolve_migration_image(
    image: &ImageFlags,
    migration_image: Option<&ImageFlags>,
    plan: &UpgradePlan,
) -> Result<String> {
    match migration_image {
        Some(flags) => compute_image(&flags.name, &image.tag, &[]),
        None => {
            let suffix = format!(
                "-migration-{}-{}",
                plan.current_db_version, plan.image_db_version
            );
            compute_image(&image.name, &image.tag, &[&suffix])
        }
    }
}

fn helper_step(
    driver: &dyn BackendDriver,
    step: UpgradeStep,
    container: &str,
    image: &str,
    script_name: &str,
    script: &str,
) -> Result<()> {
    let bundle = ScriptBundle::new()?;
    bundle.write_script(script_name, script)?;
    driver
        .run_helper_container(
            container,
            image,
            &[bundle.bind()],
            &[ScriptBundle::container_path(script_name)],
        )
        .map_err(|source| Error::HelperContainerFailed { step, source })
}

fn run_db_version_upgrade(
    driver: &dyn BackendDriver,
    image: &ImageFlags,
    migration_image: Option<&ImageFlags>,
    plan: &UpgradePlan,
) -> Result<()> {
    tracing::info!(
        "Previous database version is {}, new one is {}. Performing a version upgrade...",
        plan.current_db_version,
        plan.image_db_version
    );
    let migration_url = resolve_migration_image(image, migration_image, plan)?;
    let creds = hostinfo::registry_creds();
    let prepared = driver.prepare_image(&migration_url, image.pull_policy, creds.as_ref())?;
    tracing::info!("Using migration image {prepared}");

    helper_step(
        driver,
        UpgradeStep::DbMigrating,
        DB_UPGRADE_CONTAINER,
        &prepared,
        bundle::DB_UPGRADE_SCRIPT,
        &bundle::db_upgrade_script(&plan.current_db_version, &plan.image_db_version),
    )
}

fn run_db_finalize(
    driver: &dyn BackendDriver,
    server_image: &str,
    schema_update_required: bool,
) -> Result<()> {
    helper_step(
        driver,
        UpgradeStep::Finalizing,
        DB_FINALIZE_CONTAINER,
        server_image,
        bundle::DB_FINALIZE_SCRIPT,
        &bundle::db_finalize_script(schema_update_required),
    )
}

fn run_post_upgrade(driver: &dyn BackendDriver, server_image: &str) -> Result<()> {
    helper_step(
        driver,
        UpgradeStep::PostUpgrading,
        POST_UPGRADE_CONTAINER,
        server_image,
        bundle::POST_UPGRADE_SCRIPT,
        &bundle::post_upgrade_script(),
    )
}

/// Run the mutation steps of the plan, in order: database migration when
/// required, then finalization (always), then post-upgrade fix-ups. Shared
/// by the in-place upgrade and the remote migration paths. Assumes the
/// service is already stopped.
pub fn run_upgrade_steps(
    driver: &dyn BackendDriver,
    server_image: &str,
    image: &ImageFlags,
    migration_image: Option<&ImageFlags>,
    plan: &UpgradePlan,
) -> Result<()> {
    if plan.requires_db_major_upgrade {
        run_db_version_upgrade(driver, image, migration_image, plan)?;
    } else {
        tracing::info!(
            "Upgrading without changing the database version ({})",
            plan.current_db_version
        );
    }
    run_db_finalize(driver, server_image, plan.requires_schema_update)?;
    run_post_upgrade(driver, server_image)
}

/// Upgrade the deployed server to the given image.
///
/// Inspection and planning happen before any mutation, so failures up to
/// there are safe to retry. Once the service is stopped the deferred
/// restart is armed: whatever the remaining steps do, the service is
/// started again before this returns.
pub fn upgrade(
    cnx: &Connection,
    image: &ImageFlags,
    migration_image: Option<&ImageFlags>,
) -> Result<()> {
    let server_image = compute_image(&image.name, &image.tag, &[])?;

    tracing::info!("Inspecting {server_image}");
    let mut facts = inspect::inspect_image(cnx.driver(), &server_image, image.pull_policy)?;
    facts.merge(inspect::inspect_instance(cnx)?);

    let plan = UpgradePlan::compute(&facts)?;
    tracing::debug!(?plan, "upgrade plan computed");

    let mut stopped = StoppedService::stop(cnx.driver())?;

    let step_result = run_upgrade_steps(cnx.driver(), &server_image, image, migration_image, &plan)
        .and_then(|_| {
            cnx.driver().update_service_image(&server_image)?;
            cnx.driver().reload_service_manager()?;
            Ok(())
        });

    match stopped.restart() {
        Ok(()) => step_result,
        Err(restart) => {
            let step_error = match step_result {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!("upgrade step failed before the restart failure: {e}");
                    Some(Box::new(e))
                }
            };
            Err(Error::RestartFailed {
                restart,
                step_error,
            })
        }
    }
}

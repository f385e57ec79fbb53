use libbackend::{BackendDriver, Connection, PullPolicy};

use crate::bundle::{self, InspectScope, ScriptBundle};
use crate::error::Result;
use crate::facts::Facts;
use crate::hostinfo;

pub const INSPECT_CONTAINER: &str = "hub-inspect";

/// Run the inspection procedure inside a candidate image and parse the
/// facts it reports.
pub fn inspect_image(
    driver: &dyn BackendDriver,
    image: &str,
    pull_policy: PullPolicy,
) -> Result<Facts> {
    let creds = hostinfo::registry_creds();
    let prepared = driver.prepare_image(image, pull_policy, creds.as_ref())?;

    let bundle = ScriptBundle::new()?;
    bundle.write_script(
        bundle::INSPECT_SCRIPT,
        &bundle::inspect_script(InspectScope::Image),
    )?;

    driver.run_helper_container(
        INSPECT_CONTAINER,
        &prepared,
        &[bundle.bind()],
        &[ScriptBundle::container_path(bundle::INSPECT_SCRIPT)],
    )?;

    let raw = bundle.read_output(bundle::INSPECT_OUTPUT)?;
    Facts::parse(&raw)
}

/// Run the same inspection procedure inside the live instance, through the
/// connection contract only, yielding the `current_*` facts.
pub fn inspect_instance(cnx: &Connection) -> Result<Facts> {
    let bundle = ScriptBundle::new()?;
    bundle.write_script(
        bundle::INSPECT_SCRIPT,
        &bundle::inspect_script(InspectScope::Current),
    )?;

    let script_in_container = ScriptBundle::container_path(bundle::INSPECT_SCRIPT);
    let output_in_container = ScriptBundle::container_path(bundle::INSPECT_OUTPUT);
    cnx.exec("mkdir", &["-p", bundle::BUNDLE_MOUNT])?;
    cnx.copy(
        &bundle.path().join(bundle::INSPECT_SCRIPT).to_string_lossy(),
        &format!("server:{script_in_container}"),
        "root",
        "root",
    )?;
    cnx.exec("sh", &[&script_in_container])?;
    let raw = cnx.exec("cat", &[&output_in_container])?;
    // repeated inspections must not accumulate files in the instance
    cnx.exec("rm", &["-f", &script_in_container, &output_in_container])?;
    Facts::parse(&raw)
}

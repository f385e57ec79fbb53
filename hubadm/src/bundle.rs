use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::TempDir;

use libbackend::Bind;

use crate::error::{Error, Result};

/// Where script bundles are mounted inside containers.
pub const BUNDLE_MOUNT: &str = "/var/lib/hubadm";

pub const INSPECT_SCRIPT: &str = "inspect.sh";
pub const INSPECT_OUTPUT: &str = "inspect.out";
pub const MIGRATION_SCRIPT: &str = "migrate.sh";
pub const MIGRATION_OUTPUT: &str = "migration.out";
pub const DB_UPGRADE_SCRIPT: &str = "db-upgrade.sh";
pub const DB_FINALIZE_SCRIPT: &str = "db-finalize.sh";
pub const POST_UPGRADE_SCRIPT: &str = "post-upgrade.sh";

/// A transient directory of generated scripts and exchanged data files,
/// mounted into a helper container for exactly one orchestration step.
///
/// The directory is removed when the bundle is dropped, whatever the
/// outcome of the step; bundles are never shared between steps.
pub struct ScriptBundle {
    dir: TempDir,
}

impl ScriptBundle {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("hubadm-").tempdir()?;
        Ok(ScriptBundle { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The bind mounting this bundle at its in-container location.
    pub fn bind(&self) -> Bind {
        Bind::new(self.dir.path(), BUNDLE_MOUNT)
    }

    /// In-container path of a file in this bundle.
    pub fn container_path(name: &str) -> String {
        format!("{BUNDLE_MOUNT}/{name}")
    }

    pub fn write_script(&self, name: &str, content: &str) -> Result<()> {
        let path = self.dir.path().join(name);
        fs::write(&path, content)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    /// Read a data file written back by the helper container.
    pub fn read_output(&self, name: &str) -> Result<String> {
        let path = self.dir.path().join(name);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingInspectionOutput(name.to_string()),
            _ => Error::Io(e),
        })
    }
}

/// What an inspection script describes: a staged image or the live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectScope {
    Image,
    Current,
}

pub fn inspect_script(scope: InspectScope) -> String {
    let prefix = match scope {
        InspectScope::Image => "image",
        InspectScope::Current => "current",
    };
    let db_version_source = match scope {
        InspectScope::Image => r"psql -V | sed 's/^psql (PostgreSQL) \([0-9]*\).*/\1/'",
        InspectScope::Current => "cat /var/lib/pgsql/data/PG_VERSION",
    };
    format!(
        r#"#!/bin/sh
set -e
{{
    echo "{prefix}_db_version=$({db_version_source})"
    echo "{prefix}_release=$(cat /etc/hub-release)"
}} > {BUNDLE_MOUNT}/{INSPECT_OUTPUT}
"#
    )
}

pub fn db_upgrade_script(old_version: &str, new_version: &str) -> String {
    format!(
        r#"#!/bin/sh
set -e
echo "Migrating the database from version {old_version} to {new_version}..."
chown -R postgres:postgres /var/lib/pgsql
runuser -s /bin/bash postgres -c '
    pg_upgrade \
        --old-bindir=/usr/lib/postgresql{old_version}/bin \
        --new-bindir=/usr/lib/postgresql{new_version}/bin \
        --old-datadir=/var/lib/pgsql/data-pg{old_version} \
        --new-datadir=/var/lib/pgsql/data
'
"#
    )
}

pub fn db_finalize_script(schema_update_required: bool) -> String {
    let schema_update = if schema_update_required {
        "/usr/sbin/hub-schema-upgrade\n"
    } else {
        ""
    };
    format!(
        r#"#!/bin/sh
set -e
runuser -s /bin/bash postgres -c 'pg_ctl start -D /var/lib/pgsql/data'
{schema_update}runuser -s /bin/bash postgres -c 'vacuumdb --all --analyze'
runuser -s /bin/bash postgres -c 'pg_ctl stop -D /var/lib/pgsql/data'
"#
    )
}

pub fn post_upgrade_script() -> String {
    r#"#!/bin/sh
set -e
echo "Applying post-upgrade fix-ups..."
/usr/sbin/hub-post-upgrade
"#
    .to_string()
}

pub fn migration_script(source_host: &str, user: &str, ssh_auth_socket: &str) -> String {
    format!(
        r#"#!/bin/sh
set -e
export SSH_AUTH_SOCK={ssh_auth_socket}
SRC="{user}@{source_host}"
SSH="ssh -A"
if [ -f /tmp/ssh_config ]; then
    SSH="$SSH -F /tmp/ssh_config"
fi

echo "Copying the server data from $SRC..."
rsync -e "$SSH" -a "$SRC:/var/lib/pgsql/data/" /var/lib/pgsql/data-migrated/
rsync -e "$SSH" -a "$SRC:/etc/hub/" /etc/hub/

{{
    echo "timezone=$($SSH "$SRC" timedatectl show -p Timezone --value)"
    echo "source_db_version=$(cat /var/lib/pgsql/data-migrated/PG_VERSION)"
    echo "target_db_version=$(psql -V | sed 's/^psql (PostgreSQL) \([0-9]*\).*/\1/')"
}} > {BUNDLE_MOUNT}/{MIGRATION_OUTPUT}
"#
    )
}

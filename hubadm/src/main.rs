use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use hubadm::cli_commands;
use hubadm::error::Error;
use hubadm::image::ImageFlags;
use hubadm::migrate::MigrateFlags;
use libbackend::{BackendKind, PullPolicy};

#[derive(Parser)]
#[command(name = "hubadm")]
#[command(about = "Deploy, inspect and upgrade the containerized hub server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ImageArgs {
    /// Image name, e.g. registry.example.com/hub/server
    #[arg(long)]
    image: String,

    #[arg(long, default_value = "latest")]
    tag: String,

    /// One of always, ifmissing, never
    #[arg(long, default_value = "ifmissing")]
    pull_policy: String,

    /// Override for the version-specific database migration image
    #[arg(long)]
    migration_image: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Extract facts from an image or the deployed server")]
    Inspect {
        #[arg(long)]
        image: Option<String>,
        #[arg(long, default_value = "latest")]
        tag: String,
        #[arg(long, default_value = "ifmissing")]
        pull_policy: String,
        #[arg(long)]
        backend: Option<String>,
    },
    #[command(about = "Upgrade the deployed server to a new image")]
    Upgrade {
        #[command(flatten)]
        image: ImageArgs,
        #[arg(long)]
        backend: Option<String>,
    },
    #[command(about = "Migrate a remote server deployment into a container")]
    Migrate {
        /// Hostname of the remote server to migrate from
        #[arg(value_name = "SOURCE_HOST")]
        source_host: String,
        #[arg(long, default_value = "root")]
        user: String,
        #[command(flatten)]
        image: ImageArgs,
        /// SSH agent socket, defaults to $SSH_AUTH_SOCK
        #[arg(long)]
        ssh_auth_socket: Option<PathBuf>,
        #[arg(long)]
        ssh_config: Option<PathBuf>,
        #[arg(long)]
        ssh_known_hosts: Option<PathBuf>,
        #[arg(long)]
        backend: Option<String>,
    },
    #[command(about = "Start the server")]
    Start {
        #[arg(long)]
        backend: Option<String>,
    },
    #[command(about = "Stop the server")]
    Stop {
        #[arg(long)]
        backend: Option<String>,
    },
    #[command(about = "Restart the server")]
    Restart {
        #[arg(long)]
        backend: Option<String>,
    },
}

fn parse_backend(backend: Option<String>) -> Result<Option<BackendKind>, Error> {
    backend
        .map(|value| BackendKind::from_str(&value))
        .transpose()
        .map_err(Error::from)
}

fn image_flags(args: &ImageArgs) -> Result<(ImageFlags, Option<ImageFlags>), Error> {
    let pull_policy = PullPolicy::from_str(&args.pull_policy)?;
    let image = ImageFlags {
        name: args.image.clone(),
        tag: args.tag.clone(),
        pull_policy,
    };
    let migration_image = args.migration_image.as_ref().map(|name| ImageFlags {
        name: name.clone(),
        ..image.clone()
    });
    Ok((image, migration_image))
}

fn ssh_auth_socket(flag: Option<PathBuf>) -> Result<PathBuf, Error> {
    flag.or_else(|| std::env::var_os("SSH_AUTH_SOCK").map(PathBuf::from))
        .ok_or(Error::NoSshAgent)
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            image,
            tag,
            pull_policy,
            backend,
        } => {
            let backend = parse_backend(backend)?;
            let pull_policy = PullPolicy::from_str(&pull_policy).map_err(Error::from)?;
            cli_commands::inspect_cmd(backend, image, &tag, pull_policy)?;
        }
        Commands::Upgrade { image, backend } => {
            let backend = parse_backend(backend)?;
            let (image, migration_image) = image_flags(&image)?;
            cli_commands::upgrade_cmd(backend, image, migration_image)?;
        }
        Commands::Migrate {
            source_host,
            user,
            image,
            ssh_auth_socket: socket,
            ssh_config,
            ssh_known_hosts,
            backend,
        } => {
            let backend = parse_backend(backend)?;
            let (image, migration_image) = image_flags(&image)?;
            let flags = MigrateFlags {
                source_host,
                user,
                ssh_auth_socket: ssh_auth_socket(socket)?,
                ssh_config,
                ssh_known_hosts,
            };
            cli_commands::migrate_cmd(backend, image, migration_image, flags)?;
        }
        Commands::Start { backend } => cli_commands::start_cmd(parse_backend(backend)?)?,
        Commands::Stop { backend } => cli_commands::stop_cmd(parse_backend(backend)?)?,
        Commands::Restart { backend } => cli_commands::restart_cmd(parse_backend(backend)?)?,
    }
    Ok(())
}

mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cytoskel", version)]
#[command(about = "Staging buckets with S3 Access Grants, and the people who upload to them", long_about = None)]
struct Cli {
    /// Settings file (default: cytoskel.yaml in the current directory)
    #[arg(long, global = true, env = "CYTOSKEL_CONFIG")]
    config: Option<PathBuf>,

    /// Stack name
    #[arg(long, global = true, env = "CYTOSKEL_STACK")]
    stack: Option<String>,

    /// Environment name
    #[arg(long = "env", global = true, env = "CYTOSKEL_ENV")]
    environment: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the staging infrastructure
    Up,
    /// Show what `up` would change
    Preview,
    /// Delete the staging infrastructure
    Destroy {
        /// Leave protected resources (the bucket) in place
        #[arg(long)]
        exclude_protected: bool,
        /// Run without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the recorded resources and outputs of the stack
    Status,
    /// Manage uploader users
    #[command(subcommand)]
    User(UserCommands),
    /// Inspect Access Grants locations
    #[command(subcommand)]
    Location(LocationCommands),
    /// Manage access grants
    #[command(subcommand)]
    Grant(GrantCommands),
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user with an access key and add it to the uploader group
    Create {
        /// IAM user name
        username: String,
    },
    /// Delete a user together with its access keys
    Delete {
        /// IAM user name
        username: String,
    },
    /// List IAM users
    List,
}

#[derive(Subcommand)]
enum LocationCommands {
    /// List registered locations
    List,
}

#[derive(Subcommand)]
enum GrantCommands {
    /// Grant read-write access under a location
    Create {
        /// ARN of the IAM user or role receiving the grant
        userarn: String,
        /// Location ID (see `cytoskel location list`)
        location_id: String,
        /// Sub-prefix under the location (default: `default_prefix` from the settings, `*`)
        prefix: Option<String>,
    },
    /// Delete a grant
    Delete {
        /// Grant ID
        grant_id: String,
    },
    /// List grants
    List,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = utils::load_settings(cli.config.as_deref(), cli.stack, cli.environment)?;

    // status reads local state only
    if matches!(cli.command, Commands::Status) {
        return commands::status::handle(&settings).await;
    }

    let staging = cytoskel_cloud_aws::StagingStack::connect(settings).await;

    match cli.command {
        Commands::Up => commands::up::handle(&staging).await?,
        Commands::Preview => commands::up::preview(&staging).await?,
        Commands::Destroy {
            exclude_protected,
            yes,
        } => commands::destroy::handle(&staging, exclude_protected, yes).await?,
        Commands::User(user_cmd) => match user_cmd {
            UserCommands::Create { username } => {
                commands::user::create(&staging, &username).await?
            }
            UserCommands::Delete { username } => {
                commands::user::delete(&staging, &username).await?
            }
            UserCommands::List => commands::user::list(&staging).await?,
        },
        Commands::Location(LocationCommands::List) => commands::location::list(&staging).await?,
        Commands::Grant(grant_cmd) => match grant_cmd {
            GrantCommands::Create {
                userarn,
                location_id,
                prefix,
            } => {
                let prefix = prefix.unwrap_or_else(|| staging.settings().default_prefix.clone());
                commands::grant::create(&staging, &userarn, &location_id, &prefix).await?
            }
            GrantCommands::Delete { grant_id } => {
                commands::grant::delete(&staging, &grant_id).await?
            }
            GrantCommands::List => commands::grant::list(&staging).await?,
        },
        Commands::Status => unreachable!("Status is handled before connecting to AWS"),
    }

    Ok(())
}

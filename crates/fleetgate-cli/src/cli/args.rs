use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fleetgate",
    version,
    about = "Inspect fleetgate dispatch and access control configuration"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile every table in a configuration file
    Validate(ValidateArgs),
    /// Show which backends service each operation
    Route(RouteArgs),
    /// Show the ACL decision for a principal
    Check(CheckArgs),
    Version,
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArg {
    /// Gate configuration (YAML)
    #[arg(long, short = 'c', env = "FLEETGATE_CONFIG")]
    pub config: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Clone, Debug)]
pub struct RouteArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Registered backend; repeatable. Defaults to every configured backend.
    #[arg(long = "backend", short = 'b')]
    pub backends: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Operation names to route
    #[arg(required = true)]
    pub operations: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostArg {
    Client,
    Depot,
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Principal name (user name or host id)
    #[arg(long, short = 'u')]
    pub user: String,

    /// Group membership of a user principal; repeatable
    #[arg(long = "group", short = 'g', conflicts_with = "host")]
    pub groups: Vec<String>,

    /// Treat the principal as a host of this kind
    #[arg(long, value_enum)]
    pub host: Option<HostArg>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Operation names to check
    #[arg(required = true)]
    pub operations: Vec<String>,
}

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "policy-daemond")]
#[command(about = "Cloud resource policy compliance daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display application version
    Version,

    /// Load and validate a policy file, then exit
    Validate {
        /// Path to the policy file
        #[arg(long, env = "POLICY_FILE")]
        policy_file: std::path::PathBuf,
    },

    /// Start the policy scheduler and metrics server
    Run(RunArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Cloud account or subscription identifier this daemon governs
    #[arg(long, env = "ACCOUNT_ID")]
    pub account_id: String,

    /// Cloud provider backend
    #[arg(long, env = "PROVIDER", value_enum, default_value_t = ProviderKind::Azure)]
    pub provider: ProviderKind,

    /// Management group identifier, if policies scope to one
    #[arg(long, env = "MANAGEMENT_GROUP")]
    pub management_group: Option<String>,

    /// Path to the policy file
    #[arg(long, env = "POLICY_FILE")]
    pub policy_file: std::path::PathBuf,

    /// Path to the durable remediation state file
    #[arg(long, env = "STATE_FILE", default_value = "policy-state.json")]
    pub state_file: std::path::PathBuf,

    /// Address the health/metrics HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:9090")]
    pub bind_addr: std::net::SocketAddr,

    /// Resource listing cache TTL, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Emit logs as JSON instead of human-readable text
    #[arg(long, env = "JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    Azure,
    Aws,
}

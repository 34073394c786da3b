use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "cih")]
#[command(about = "Customer identity hub CLI", long_about = None)]
struct Cli {
    /// Fail (instead of warn) when the config carries keys the command never reads
    #[arg(long, global = true, default_value_t = false)]
    strict_config: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Outer-join CRM and e-commerce records on email and print every row
    Compare {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Build the master identity set and write it to the master CSV
    Reconcile {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Ignore the existing master file and mint every global id afresh
        #[arg(long, default_value_t = false)]
        fresh: bool,

        /// Derive new global ids deterministically from this namespace
        #[arg(long)]
        id_namespace: Option<Uuid>,
    },

    /// Attribute ERP orders to global ids and write the attributed CSV
    Attribute {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Build, validate and emit an OrderPlaced event
    PublishOrder {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        customer_id: String,

        #[arg(long, allow_hyphen_values = true)]
        total: f64,
    },

    /// Check a JSON payload against a contract from the registry
    Validate {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Contract key, e.g. order_placed_contract_v1
        #[arg(long)]
        contract: String,

        /// Payload JSON string
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Path to a payload JSON file
        #[arg(long = "payload-file", conflicts_with = "payload")]
        payload_file: Option<String>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    let policy = if cli.strict_config {
        cih_config::UnusedKeyPolicy::Fail
    } else {
        cih_config::UnusedKeyPolicy::Warn
    };

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = cih_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
        Commands::Compare { config_paths } => {
            commands::pipeline::compare(&config_paths, policy)?;
        }
        Commands::Reconcile {
            config_paths,
            fresh,
            id_namespace,
        } => {
            commands::pipeline::reconcile(&config_paths, policy, fresh, id_namespace)?;
        }
        Commands::Attribute { config_paths } => {
            commands::pipeline::attribute(&config_paths, policy)?;
        }
        Commands::PublishOrder {
            config_paths,
            customer_id,
            total,
        } => {
            commands::events::publish_order(&config_paths, policy, &customer_id, total)?;
        }
        Commands::Validate {
            config_paths,
            contract,
            payload,
            payload_file,
        } => {
            commands::events::validate(&config_paths, policy, &contract, payload, payload_file)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays key=value.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

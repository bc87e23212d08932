mod config;
mod error;

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ovirt_machine::MachineActuator;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "ovirt-machine", version, about = "Provision and tear down oVirt machine VMs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a machine spec without creating anything
    Validate {
        #[arg(long)]
        spec: PathBuf,
    },
    /// Create a VM from a machine spec and configure it
    Create {
        /// Machine name, also used as the guest hostname
        #[arg(long)]
        name: String,
        #[arg(long)]
        cluster_tag: String,
        #[arg(long)]
        spec: PathBuf,
        /// Ignition payload passed to the guest
        #[arg(long)]
        user_data: PathBuf,
    },
    /// Stop and remove a VM
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Look up a VM by id or by exact name
    Get {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    Start {
        #[arg(long)]
        id: String,
    },
    /// Print the first guest-reported address on an ethernet device
    FindIp {
        #[arg(long)]
        id: String,
        /// Address to skip; repeatable
        #[arg(long = "exclude")]
        excluded: Vec<String>,
    },
    /// Print the engine version
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let actuator = MachineActuator::from_env()?;

    match command {
        Command::Validate { spec } => {
            let spec = config::load_spec(&spec)?;
            actuator.validate(&spec).await?;
            info!("machine spec is valid");
        }
        Command::Create {
            name,
            cluster_tag,
            spec,
            user_data,
        } => {
            let spec = config::load_spec(&spec)?;
            let payload = config::load_user_data(&user_data)?;
            let instance = actuator.create_vm(&name, &cluster_tag, &payload, &spec).await?;
            print_json(&instance)?;
        }
        Command::Delete { id } => {
            actuator.delete_vm(&id).await?;
            info!(vm_id = %id, "vm deleted");
        }
        Command::Get { id: Some(id), .. } => print_json(&actuator.get_vm_by_id(&id).await?)?,
        Command::Get { name, .. } => {
            let name = name.unwrap_or_default();
            print_json(&actuator.get_vm_by_name(&name).await?)?;
        }
        Command::Start { id } => actuator.start_vm(&id).await?,
        Command::FindIp { id, excluded } => {
            let excluded: HashSet<String> = excluded.into_iter().collect();
            println!("{}", actuator.find_usable_ip(&id, &excluded).await?);
        }
        Command::Version => println!("{}", actuator.engine_version().await?),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, info};
use tokio_util::sync::CancellationToken;

use kit_core::controller::{Controller, NatGatewayController, Outcome};
use kit_core::owner::ControlPlane;
use kit_core::provider::GatewayApi;
use kit_core::providers::MemoryGateway;
use kit_core::scheduler::{PassKind, PassReport, run_pass};
use kit_core::{ControllerConfig, ReconcileContext};
use kit_provider_aws::Ec2Gateway;
use kit_store::{OwnerStore, StoreConfig, create_store, lease_for};

#[derive(Parser)]
#[command(name = "kit")]
#[command(about = "Converge NAT gateways for control planes", long_about = None)]
struct Cli {
    /// Backend that hosts the gateways
    #[arg(long, value_enum, default_value_t = ProviderKind::Aws, global = true)]
    provider: ProviderKind,

    /// AWS region
    #[arg(long, env = "KIT_REGION", default_value = "us-west-2", global = true)]
    region: String,

    /// Directory holding owner documents and lock files
    #[arg(long, env = "KIT_STORE_DIR", default_value = ".kit", global = true)]
    store_dir: String,

    /// Seconds to wait for a new gateway to become available
    #[arg(long, default_value_t = kit_core::config::DEFAULT_WAIT_TIMEOUT_SECS, global = true)]
    wait_timeout: u64,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderKind {
    /// EC2 in the selected region
    Aws,
    /// Process-local gateways, for dry runs
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an owner document with its dependency identifiers
    Init {
        owner: String,

        /// Elastic IP allocation ID
        #[arg(long)]
        address_id: Option<String>,

        /// Private subnet ID (repeatable; the first one is used)
        #[arg(long = "subnet")]
        subnets: Vec<String>,
    },
    /// Print an owner document
    Show { owner: String },
    /// List stored owners
    List,
    /// Run one pass for an owner (finalize if it is marked for deletion)
    Reconcile { owner: String },
    /// Mark an owner for deletion, tear down its gateway and remove it
    Finalize { owner: String },
    /// Keep reconciling an owner, honouring requeue intervals
    Run {
        owner: String,

        /// Stop after this many passes
        #[arg(long)]
        passes: Option<u32>,
    },
    /// Remove an owner's lock left behind by a crashed pass
    ForceUnlock { owner: String, lock_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .init();
}

async fn run(cli: Cli) -> Result<(), String> {
    let lease = lease_for(Duration::from_secs(cli.wait_timeout));
    let store = create_store(&StoreConfig::local(cli.store_dir.clone()).with_lease(lease))
        .await
        .map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Init {
            ref owner,
            ref address_id,
            ref subnets,
        } => run_init(store.as_ref(), owner, address_id.clone(), subnets.clone()).await,
        Commands::Show { ref owner } => run_show(store.as_ref(), owner).await,
        Commands::List => run_list(store.as_ref()).await,
        Commands::Reconcile { ref owner } => {
            let controller = build_controller(&cli).await;
            let cancel = shutdown_token();
            let report = run_owner_pass(store.as_ref(), &controller, owner, &cancel).await?;
            finish(report)
        }
        Commands::Finalize { ref owner } => {
            mark_for_deletion(store.as_ref(), owner).await?;
            let controller = build_controller(&cli).await;
            let cancel = shutdown_token();
            let report = run_owner_pass(store.as_ref(), &controller, owner, &cancel).await?;
            finish(report)
        }
        Commands::Run { ref owner, passes } => {
            let controller = build_controller(&cli).await;
            run_loop(store.as_ref(), &controller, owner, passes).await
        }
        Commands::ForceUnlock {
            ref owner,
            ref lock_id,
        } => {
            store
                .force_unlock(owner, lock_id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{} Lock {} on {} removed", "✓".green(), lock_id, owner);
            Ok(())
        }
    }
}

async fn build_controller(cli: &Cli) -> NatGatewayController<Box<dyn GatewayApi>> {
    let api: Box<dyn GatewayApi> = match cli.provider {
        ProviderKind::Aws => Box::new(Ec2Gateway::new(&cli.region).await),
        ProviderKind::Memory => Box::new(MemoryGateway::new()),
    };
    let config =
        ControllerConfig::default().with_wait_timeout(Duration::from_secs(cli.wait_timeout));
    info!("Using {} gateway API", api.name());
    NatGatewayController::with_config(api, config)
}

/// Token cancelled on Ctrl-C so an in-flight wait is abandoned cleanly
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    token
}

async fn run_init(
    store: &dyn OwnerStore,
    name: &str,
    address_id: Option<String>,
    subnets: Vec<String>,
) -> Result<(), String> {
    let lock = store
        .acquire_lock(name, "init")
        .await
        .map_err(|e| e.to_string())?;

    let result = async {
        let mut owner = store
            .read_owner(name)
            .await
            .map_err(|e| e.to_string())?
            .unwrap_or_else(|| ControlPlane::new(name));
        let infra = &mut owner.status.infrastructure;
        if address_id.is_some() {
            infra.address_allocation_id = address_id;
        }
        if !subnets.is_empty() {
            infra.private_subnet_ids = subnets;
        }
        store.write_owner(&owner).await.map_err(|e| e.to_string())
    }
    .await;

    store.release_lock(&lock).await.map_err(|e| e.to_string())?;
    result?;
    println!("{} Owner {} written", "✓".green(), name);
    Ok(())
}

async fn run_show(store: &dyn OwnerStore, name: &str) -> Result<(), String> {
    let owner = load_owner(store, name).await?;
    let json = serde_json::to_string_pretty(&owner).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run_list(store: &dyn OwnerStore) -> Result<(), String> {
    for name in store.list_owners().await.map_err(|e| e.to_string())? {
        let owner = load_owner(store, &name).await?;
        let gateway = owner.nat_gateway_id().unwrap_or("-");
        let marker = if owner.is_being_deleted() {
            " (deleting)".yellow().to_string()
        } else {
            String::new()
        };
        println!("{}  {}{}", name.bold(), gateway, marker);
    }
    Ok(())
}

async fn load_owner(store: &dyn OwnerStore, name: &str) -> Result<ControlPlane, String> {
    store
        .read_owner(name)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Owner {} not found", name))
}

async fn mark_for_deletion(store: &dyn OwnerStore, name: &str) -> Result<(), String> {
    let lock = store
        .acquire_lock(name, "mark-deleted")
        .await
        .map_err(|e| e.to_string())?;

    let result = async {
        let mut owner = load_owner(store, name).await?;
        owner.deletion_requested = true;
        store.write_owner(&owner).await.map_err(|e| e.to_string())
    }
    .await;

    store.release_lock(&lock).await.map_err(|e| e.to_string())?;
    result
}

/// Lock the owner, run one pass, persist what the controller wrote
async fn run_owner_pass(
    store: &dyn OwnerStore,
    controller: &dyn Controller,
    name: &str,
    cancel: &CancellationToken,
) -> Result<PassReport, String> {
    let lock = store
        .acquire_lock(name, controller.name())
        .await
        .map_err(|e| e.to_string())?;

    let result = async {
        let mut owner = load_owner(store, name).await?;
        let ctx = ReconcileContext::new().with_cancellation(cancel.clone());
        let report = run_pass(controller, &ctx, &mut owner).await;

        if report.finalized() {
            store.remove_owner(name).await.map_err(|e| e.to_string())?;
        } else {
            store.write_owner(&owner).await.map_err(|e| e.to_string())?;
        }
        print_report(name, &owner, &report);
        Ok(report)
    }
    .await;

    store.release_lock(&lock).await.map_err(|e| e.to_string())?;
    result
}

async fn run_loop(
    store: &dyn OwnerStore,
    controller: &dyn Controller,
    name: &str,
    passes: Option<u32>,
) -> Result<(), String> {
    let cancel = shutdown_token();
    let mut count = 0;

    loop {
        let report = run_owner_pass(store, controller, name, &cancel).await?;
        count += 1;

        if report.finalized() {
            return Ok(());
        }
        if passes.is_some_and(|limit| count >= limit) || cancel.is_cancelled() {
            return finish(report);
        }
        let Some(delay) = report.result.requeue_after else {
            return finish(report);
        };

        println!("  Next pass in {}s", delay.as_secs());
        tokio::select! {
            _ = cancel.cancelled() => return finish(report),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn print_report(name: &str, owner: &ControlPlane, report: &PassReport) {
    let verb = match report.kind {
        PassKind::Reconcile => "Reconcile",
        PassKind::Finalize => "Finalize",
    };
    match (&report.result.outcome, &report.error) {
        (Outcome::Succeeded, _) => {
            let gateway = owner.nat_gateway_id().unwrap_or("none");
            println!(
                "{} {} {}: nat-gateway {}",
                "✓".green(),
                verb,
                name.bold(),
                gateway
            );
        }
        (Outcome::Failed, Some(e)) if e.is_waiting_for_dependency() => {
            println!("{} {} {}: {}", "…".yellow(), verb, name.bold(), e);
        }
        (Outcome::Failed, Some(e)) if e.requires_operator() => {
            println!(
                "{} {} {}: {}",
                "✗".red().bold(),
                verb,
                name.bold(),
                e.to_string().red()
            );
        }
        (Outcome::Failed, error) => {
            let message = error.as_ref().map(|e| e.to_string()).unwrap_or_default();
            println!("{} {} {}: {}", "✗".red(), verb, name.bold(), message);
        }
    }
}

fn finish(report: PassReport) -> Result<(), String> {
    match report.error {
        Some(e) => Err(e.to_string()),
        None => Ok(()),
    }
}

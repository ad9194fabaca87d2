// src/main.rs
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, BlockId, BlockNumber};
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use tokio::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod classifier;
mod contracts;
mod encoder;
mod error;
mod invoker;
mod rpc;
mod simulation;
mod types;

use crate::rpc::{SimulationApiServer, SimulationRpcImpl};
use crate::simulation::Simulator;
use crate::types::UserOperation;

/// v0.6 EntryPoint, deployed at the same address on every supported chain.
const DEFAULT_ENTRY_POINT: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long, env = "ETH_RPC_URL")]
    eth_rpc_url: String,

    #[clap(long, env = "ENTRY_POINT", default_value = DEFAULT_ENTRY_POINT, value_parser = parse_address)]
    entry_point: Address,

    /// Block tag the static call executes against (latest, pending, or a number)
    #[clap(long, default_value = "latest")]
    block: BlockNumber,

    #[clap(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[clap(short, long, default_value = "127.0.0.1:4337")]
    rpc_server_addr: String,

    /// Simulate the JSON user operation in this file, print the result and exit
    #[clap(long)]
    user_op: Option<PathBuf>,

    #[clap(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let provider = Provider::<Http>::try_from(args.eth_rpc_url.as_str())
        .context("eth rpc url should be a valid http endpoint")?;
    let simulator = Simulator::new(provider, args.entry_point)
        .with_block(BlockId::Number(args.block));
    let timeout = Duration::from_millis(args.timeout_ms);

    info!(
        "Simulating against EntryPoint {:?} at block {:?}",
        simulator.entry_point(),
        args.block
    );

    if let Some(path) = args.user_op {
        return simulate_once(&simulator, &path, timeout).await;
    }

    let server_addr: SocketAddr = args
        .rpc_server_addr
        .parse()
        .context("rpc server addr should be a socket address")?;
    let simulation_rpc = SimulationRpcImpl::new(Arc::new(simulator), timeout);

    info!("Starting validation simulation RPC server on {}", server_addr);

    let server_handle = start_server(server_addr, simulation_rpc).await?;

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;
    server_handle.stop()?;
    info!("Server stopped");

    Ok(())
}

fn parse_address(value: &str) -> Result<Address, String> {
    value
        .parse()
        .map_err(|e| format!("invalid address {value}: {e:?}"))
}

async fn simulate_once(
    simulator: &Simulator<Provider<Http>>,
    path: &Path,
    timeout: Duration,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("should read user operation from {}", path.display()))?;
    let user_op: UserOperation =
        serde_json::from_str(&raw).context("user operation file should be valid JSON")?;

    let result = simulator
        .simulate_validation_until(&user_op, Instant::now() + timeout)
        .await?;
    let range = result.valid_time_range();
    info!(
        "Validation passed, valid from {} until {}",
        range.valid_after, range.valid_until
    );
    rpc::check_validity_window(&result, rpc::unix_now());
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

async fn start_server(
    server_addr: SocketAddr,
    simulation_rpc: SimulationRpcImpl<Provider<Http>>,
) -> anyhow::Result<ServerHandle> {
    let server = ServerBuilder::default().build(server_addr).await?;

    let server_handle = server.start(simulation_rpc.into_rpc());

    Ok(server_handle)
}

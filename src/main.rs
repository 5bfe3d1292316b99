use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use payloop::application::chunked::ChunkConfig;
use payloop::application::payment_loop::PaymentLoop;
use payloop::domain::address::{AccountInfo, Address};
use payloop::infrastructure::in_memory::InMemoryTransport;
use payloop::infrastructure::simulated_path::{AddressAuthority, SimulatedPath};
use payloop::interfaces::csv::report_writer::ReportWriter;
use rust_decimal::Decimal;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Measures how fast a target amount can be looped through a simulated path.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Amount that must arrive back at the node
    #[arg(long, default_value_t = 1_000_000)]
    target: u64,

    /// Lowest acceptable ratio of arrived to sent amount per chunk
    #[arg(long, default_value = "0.9")]
    min_rate: Decimal,

    /// Rate the simulated path converts amounts at
    #[arg(long, default_value = "0.95")]
    path_rate: Decimal,

    /// Fixed amount the simulated path adds to every packet (may be negative)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    path_delta: i64,

    /// Liquidity ceiling of the simulated path
    #[arg(long)]
    max_packet_amount: Option<u64>,

    /// Latency added to every outgoing packet, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Parallel attempt chains started immediately
    #[arg(long, default_value_t = 4)]
    initial_attempts: usize,

    /// Interval between additional attempt chains, in milliseconds
    #[arg(long, default_value_t = 1000)]
    additive_increase_ms: u64,

    /// Give up if the target has not arrived after this many seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Address handed out by address discovery
    #[arg(long, default_value = "test.example.loop")]
    address: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Inbound account: its parent answers address discovery.
    let inbound = Arc::new(InMemoryTransport::new());
    inbound.connect_remote(Arc::new(AddressAuthority::new(AccountInfo {
        client_address: Address::new(cli.address).into_diagnostic()?,
        asset_code: "XYZ".to_string(),
        asset_scale: 9,
    })));

    // Outbound account: everything sent goes through the simulated path and
    // comes back in on the inbound account.
    let mut path = SimulatedPath::new(
        Address::new("test.example.path").into_diagnostic()?,
        inbound.clone(),
    )
    .with_rate(cli.path_rate)
    .with_delta(cli.path_delta);
    if let Some(max) = cli.max_packet_amount {
        path = path.with_max_packet_amount(max);
    }
    let outbound = Arc::new(InMemoryTransport::with_latency(Duration::from_millis(
        cli.latency_ms,
    )));
    outbound.connect_remote(Arc::new(path));

    let payment_loop = PaymentLoop::connect(outbound, inbound)
        .await
        .into_diagnostic()?;

    let config = ChunkConfig {
        initial_attempts: cli.initial_attempts,
        additive_increase_interval: Duration::from_millis(cli.additive_increase_ms),
        ..ChunkConfig::default()
    };
    let report = tokio::time::timeout(
        Duration::from_secs(cli.timeout_secs),
        payment_loop.chunked_with_config(cli.target, cli.min_rate, config),
    )
    .await
    .map_err(|_| {
        miette!(
            "target of {} not reached within {}s",
            cli.target,
            cli.timeout_secs
        )
    })?
    .into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_reports([&report]).into_diagnostic()?;

    Ok(())
}

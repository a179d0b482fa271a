//! Daemon entry point: config, wiring, signals.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use chayd::rpc::{self, Gateway};
use chayd::{subscribers, Bus, LogWriter, OsSpawner, StatusHub, SubscriberSet, SupervisorRegistry};

#[derive(Parser, Debug)]
#[command(name = "chayd", version, about = "single-node process-supervision daemon")]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "/etc/chayd/chayd.toml")]
    config: PathBuf,

    /// Override the RPC socket path from the config.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log filter, tracing EnvFilter syntax (RUST_LOG wins if set).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!(%err, "daemon failed");
        std::process::exit(1);
    }
}

fn init_tracing(fallback: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = chayd::config::read_from_file(&args.config)?;
    let programs = config.programs()?;
    let socket = args
        .socket
        .unwrap_or_else(|| config.daemon.socket_path.clone());
    tracing::info!(
        config = %args.config.display(),
        programs = programs.len(),
        "configuration loaded"
    );

    let token = CancellationToken::new();
    let bus = Bus::new(256);
    let hub = Arc::new(StatusHub::new(&programs, config.daemon.status_queue_depth));

    let set = SubscriberSet::new(vec![Arc::new(LogWriter)]);
    let pump = subscribers::attach(&bus, set, token.child_token());

    let registry = Arc::new(SupervisorRegistry::new(
        programs,
        Arc::new(OsSpawner),
        bus.clone(),
        Arc::clone(&hub),
        token.child_token(),
    ));
    registry.autostart().await;

    let gateway = Arc::new(Gateway::new(Arc::clone(&registry), hub));
    let mut server = tokio::spawn(rpc::serve(socket, gateway, token.child_token()));

    let signal = tokio::select! {
        signal = chayd::wait_for_signal() => signal?,
        result = &mut server => {
            token.cancel();
            return match result {
                Ok(Ok(())) => Err("rpc server exited unexpectedly".into()),
                Ok(Err(err)) => Err(err.into()),
                Err(err) => Err(err.into()),
            };
        }
    };
    tracing::info!(signal, "shutting down");

    if let Err(err) = registry.shutdown(config.daemon.shutdown_grace()).await {
        tracing::error!(%err, "shutdown incomplete");
    }
    token.cancel();
    let _ = server.await;
    let _ = pump.await;
    Ok(())
}

use std::{net::SocketAddr, process::ExitCode};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hopsim::{
    cli::{self, Args},
    config::TransportKind,
    Simulator, Tcp, Transport, TransportError, Ws, WsOptions,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::from_matches(&cli::command().get_matches());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let sim = match config.simulator() {
        Ok(sim) => sim,
        Err(e) => {
            error!(error = %e, "invalid config");
            return ExitCode::FAILURE;
        }
    };

    info!(
        routes = sim.routes().len(),
        transport = %config.transport,
        update_rate_ms = sim.update_rate_ms(),
        "Starting simulator"
    );

    let result = match config.transport {
        TransportKind::Ws => {
            run(Ws::new(WsOptions::default().paths(config.paths.clone())), config.listen, sim).await
        }
        TransportKind::Tcp => run(Tcp::default(), config.listen, sim).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulator stopped");
            ExitCode::FAILURE
        }
    }
}

/// Serves sessions until the transport fails or the process is interrupted.
async fn run<T: Transport>(
    mut transport: T,
    addr: SocketAddr,
    sim: Simulator,
) -> Result<(), TransportError> {
    transport.bind(addr).await?;
    if let Some(local) = transport.local_addr() {
        info!(%local, "Listening");
    }

    tokio::select! {
        res = transport.serve(sim) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

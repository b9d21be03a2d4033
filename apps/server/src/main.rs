#![warn(clippy::all, clippy::pedantic)]

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use statusboard_service::{Config, Scheduler, build_scheduler};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;

/// Jurisdiction API status board.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())?.with_env_overrides().validated();
    info!("{config}");

    let ip: IpAddr = config.server.bind.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);

    let scheduler = build_scheduler(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run(shutdown_rx).await }
    });

    let served = run_server(addr, scheduler).await;

    stop_scheduler(&shutdown_tx, runner).await;

    served
}

/// Signal the scheduler loop to stop and wait for it. Returns false if the task died.
async fn stop_scheduler(shutdown: &watch::Sender<bool>, runner: JoinHandle<()>) -> bool {
    let _ = shutdown.send(true);
    match runner.await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Scheduler task ended abnormally");
            false
        }
    }
}

async fn run_server(addr: SocketAddr, scheduler: Scheduler) -> Result<(), AppError> {
    let scheduler = web::Data::new(scheduler);

    info!(%addr, "Server running");
    HttpServer::new(move || App::new().app_data(scheduler.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}

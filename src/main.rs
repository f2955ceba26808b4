mod aggregator;
mod args;
mod awards;
mod client;
mod config;
mod database;
mod detector;
mod lfg;
mod model;
mod poller;
mod service;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{watch, Mutex, RwLock};

use crate::aggregator::Aggregator;
use crate::args::Args;
use crate::client::Client;
use crate::config::Config;
use crate::database::Database;
use crate::lfg::LfgQueue;
use crate::poller::{Poller, StatusBoard};
use crate::service::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    // CLI flags override the config file's ClickHouse block
    if let Some(server) = args.clickhouse_server {
        config.clickhouse.server = server;
    }
    if let Some(database) = args.clickhouse_database {
        config.clickhouse.database = database;
    }
    if let Some(user) = args.clickhouse_user {
        config.clickhouse.user = Some(user);
    }
    if let Some(password) = args.clickhouse_password {
        config.clickhouse.password = Some(password);
    }

    let db = Arc::new(Database::new(&config.clickhouse).await?);
    log::info!("database ready at {}", config.clickhouse.server);

    let client = Arc::new(Client::new(
        &config.api.endpoint_url,
        &config.api.password,
        Duration::from_secs(config.api.timeout_secs),
        args.proxy.as_deref(),
    )?);

    let bind_addr = config.http.bind_addr.clone();
    let config = Arc::new(RwLock::new(config));
    let lfg = Arc::new(Mutex::new(LfgQueue::new()));
    let status = Arc::new(Mutex::new(StatusBoard::new()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = Arc::new(AppState {
        db: Arc::clone(&db),
        client: Arc::clone(&client),
        config: Arc::clone(&config),
        config_path: args.config.clone(),
        lfg: Arc::clone(&lfg),
        status: Arc::clone(&status),
        shutdown: shutdown_tx.clone(),
    });

    // ctrl-c triggers the same clean shutdown as the admin route
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("http surface listening on {bind_addr}");
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, service::router(state))
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    let aggregator = Aggregator::new(Arc::clone(&db));
    let poller = Poller::new(client, config, aggregator, lfg, status, shutdown_rx);
    poller.run().await?;

    server.await??;
    log::info!("goodbye");
    Ok(())
}

//! Corkboard sync server — shared-board backend over HTTP long-polling.
//!
//! Opens (or creates) the sqlite store, seeds a demo board when the
//! store is empty, and serves the sync API under `/apiv1` with
//! permissive CORS until interrupted. Ctrl-C triggers a graceful
//! shutdown with one final save.

use std::sync::Arc;

use log::info;
use tower_http::cors::CorsLayer;

use corkboard_sync::engine::SyncEngine;
use corkboard_sync::node::Node;
use corkboard_sync::server::{ServerConfig, SyncServer};
use corkboard_sync::storage::{NodeStore, StoreError};

const DEFAULT_DB_PATH: &str = "data.db";

fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [<db-path>] [--bind <addr>]\n\nDefaults: db-path {DEFAULT_DB_PATH}, bind 127.0.0.1:8080."
    )
}

/// A few nodes so a fresh board is not empty.
fn seed_demo_board(store: &NodeStore) -> Result<(), StoreError> {
    let demo = [
        ("Fact", "Water expands by about 9% when it freezes."),
        ("Fact", "Ice floats on liquid water."),
        ("Deduction", "Frozen pipes can burst from the inside."),
        ("Opinion", "Insulating outdoor pipes is worth the cost."),
    ];

    for (index, (kind, text)) in demo.iter().enumerate() {
        store.assign_id(&Node {
            id: 0,
            x: 40.0,
            y: 40.0 + 90.0 * index as f64,
            width: 240.0,
            height: 70.0,
            text: text.to_string(),
            kind: Some(kind.to_string()),
        })?;
    }
    info!("seeded {} demo nodes", demo.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = ServerConfig::default();
    let mut db_path = DEFAULT_DB_PATH.to_string();

    let program = std::env::args().next().unwrap_or_else(|| "corkboard-server".to_string());
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                config.bind_addr = args
                    .next()
                    .ok_or_else(|| usage(&program))?;
            }
            "--help" | "-h" => {
                println!("{}", usage(&program));
                return Ok(());
            }
            flag if flag.starts_with("--") => {
                return Err(usage(&program).into());
            }
            path => db_path = path.to_string(),
        }
    }

    let store = Arc::new(NodeStore::open(&db_path)?);
    if store.count()? == 0 {
        info!("empty store at {db_path}, seeding demo board");
        seed_demo_board(&store)?;
    }

    let engine = SyncEngine::start(store, config.autosave_period())?;
    let server = SyncServer::new(engine.clone(), config.clone());
    let app = server.router().layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("corkboard sync server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Final save so the last accepted update is durable.
    engine.shutdown().await?;
    Ok(())
}

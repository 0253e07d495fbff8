//! HTTP server: thin routing layer over the core engine

pub mod routes;
pub mod state;

pub use state::AppState;

use crate::config::GatewayConfig;
use crate::utils::error::Result;
use actix_web::{web, App, HttpServer};
use tracing::info;

/// Build the shared state and run the HTTP server until shutdown
pub async fn run_server(config: GatewayConfig) -> Result<()> {
    let bind = (config.server.host.clone(), config.server.port);
    let state = AppState::new(config)?;

    info!("Starting gateway on {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

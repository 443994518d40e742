pub mod config;
pub mod gateway;
pub mod io_struct;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod server_error;
pub mod server_images;
pub mod transport;

#[cfg(test)]
mod test_utils;

use actix_web::web;
use config::ClientConfig;
use logging::{LogFacade, init_logging};
use pipeline::Pipeline;
use server::startup;
use std::sync::Arc;
use tokio::signal;

/// Runs the control API until Ctrl+C.
pub fn start(config: ClientConfig) -> anyhow::Result<()> {
    let config = config.validated()?;
    init_logging(config.log_level_filter()?);
    let pipeline = web::Data::new(Pipeline::from_config(&config, Arc::new(LogFacade))?);

    actix_web::rt::System::new().block_on(async move {
        tokio::select! {
            res = startup(config, pipeline) => res.map_err(anyhow::Error::from),
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down");
                Ok(())
            }
        }
    })
}

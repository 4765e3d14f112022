mod cli;
mod infra;
mod loader;
mod routes;
mod server;

use tobacco_retail::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

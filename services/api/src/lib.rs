mod cli;
mod flow;
mod infra;
mod routes;
mod server;

use orryin::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

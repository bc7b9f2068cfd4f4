use anyhow::Result;
use clap::Parser;

mod auth;
mod cli;
mod config;
mod errors;
mod extract;
mod handlers;
mod helpers;
mod logging;
mod router;
mod schemas;
mod templates;

#[cfg(test)]
mod test_utils;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await?;

    Ok(())
}

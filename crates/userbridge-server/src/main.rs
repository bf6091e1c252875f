use anyhow::{Context, Result};
use userbridge_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from the optional file and environment variables
    let config = ServerConfig::load().context("Failed to load configuration")?;

    // Run the server using the library's run function
    userbridge_server::run(config).await.context("Server error")?;

    Ok(())
}

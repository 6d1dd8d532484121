use anyhow::Result;
use mediaconv_api::setup::{initialize_app, server::start_server};
use mediaconv_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    let (_state, app) = initialize_app(config.clone()).await?;

    start_server(&config, app).await
}

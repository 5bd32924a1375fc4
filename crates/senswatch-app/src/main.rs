//! SensWatch entry point.

use senswatch_core::AppConfig;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    senswatch_app::init_tracing();
    info!("Starting SensWatch v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env()?;
    senswatch_app::run(config).await
}

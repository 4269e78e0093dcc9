use clap::Parser;
use std::sync::Arc;
use tryon_relay::config::LogFormat;
use tryon_relay::utils::{logger, validation::Validate};
use tryon_relay::{adapters::http, CliConfig, GradioConnector, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    let verbose = cli.verbose;
    let config = match RelayConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            logger::init_logger(verbose);
            tracing::error!("❌ Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // 初始化日誌
    match config.log_format {
        LogFormat::Compact => logger::init_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(config.verbose),
    }

    tracing::info!("Starting tryon-relay");
    if config.verbose {
        tracing::debug!("Relay config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let connector = GradioConnector::new(config.backend.clone(), config.hf_token.clone());

    // 後端連線失敗則不提供服務
    let router = match tryon_relay::prepare(&config, Arc::new(connector)).await {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("❌ Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    http::serve(router, &config.bind_address()).await?;

    tracing::info!("👋 tryon-relay stopped");
    Ok(())
}

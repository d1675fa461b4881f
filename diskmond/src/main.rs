use std::sync::Arc;

use diskmond::bus::{LineBus, serve_lines};
use diskmond::clock::SystemClock;
use diskmond::config::DiskMonitorConfig;
use diskmond::logging;
use diskmond::probe::SysinfoProber;
use diskmond::service::DiskMonitorService;
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = DiskMonitorConfig::from_env_or_default();
    let _guard = logging::init_logging(config.log_dir.as_deref())?;

    let prober = Arc::new(SysinfoProber::new(config.usage_limits.clone()));
    let bus = Arc::new(LineBus::new(std::io::stdout()));

    let service = DiskMonitorService::start(&config, prober, bus.clone(), SystemClock)?;
    let endpoint = service.endpoint();
    endpoint.connect();

    let token = service.cancellation_token();
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = serve_lines(stdin, endpoint, bus.as_ref(), token) => {
            if let Err(e) = result {
                warn!("Inbound stream failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    service.shutdown().await?;
    Ok(())
}

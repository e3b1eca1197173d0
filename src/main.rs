use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use velocity_breakout::{
    analysis::AnalysisClient,
    api,
    execution::{ExecutionClient, ExecutionMode, ExecutionSettings, SimulatedExecutor, TradeExecutor},
    remote::{ServiceEndpoint, DEFAULT_BASE_URL},
    strategy::{ControllerSettings, StrategyConfig, StrategyController},
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the analysis service
    #[arg(long, env = "ANALYSIS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    analysis_url: String,

    /// Base URL of the execution service
    #[arg(long, env = "EXECUTION_BASE_URL", default_value = DEFAULT_BASE_URL)]
    execution_url: String,

    /// User the services are called on behalf of
    #[arg(short, long, env = "STRATEGY_USER_ID")]
    user_id: String,

    /// Brokerage account id forwarded to both services
    #[arg(short, long, env = "STRATEGY_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Bearer token for both services
    #[arg(long, env = "SERVICE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Execution mode: simulation or remote
    #[arg(short, long, env = "EXECUTION_MODE", default_value = "simulation")]
    mode: ExecutionMode,

    /// Seconds between analysis cycles
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "10")]
    poll_interval: u64,

    /// Seconds before an analysis or execution call is abandoned
    #[arg(long, env = "SERVICE_TIMEOUT_SECS", default_value = "20")]
    service_timeout: u64,

    /// Starting account equity (trades are skipped while this is 0)
    #[arg(short, long, env = "ACCOUNT_EQUITY", default_value = "0")]
    equity: f64,

    /// Stop distance in points
    #[arg(long, env = "STOP_LOSS_POINTS", default_value = "50")]
    stop_points: f64,

    /// Take profit as a multiple of the stop distance
    #[arg(long, env = "REWARD_RISK_RATIO", default_value = "2")]
    reward_risk: f64,

    /// Percent of equity risked per trade
    #[arg(long, env = "RISK_PERCENT", default_value = "1")]
    risk_percent: f64,

    /// Account currency per point per lot
    #[arg(long, env = "POINT_VALUE", default_value = "1")]
    point_value: f64,

    /// Enable the strategy on startup
    #[arg(long, env = "STRATEGY_AUTOSTART")]
    autostart: bool,

    /// Port for the control API
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("velocity_breakout=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("Starting velocity breakout controller");
    info!("Analysis service: {}", args.analysis_url);
    info!("Execution mode: {}", args.mode);
    info!("Poll interval: {}s", args.poll_interval);

    let timeout = Duration::from_secs(args.service_timeout);
    let endpoint = |base_url: &str| {
        let mut endpoint = ServiceEndpoint::new(base_url, args.user_id.clone());
        endpoint.account_id = args.account_id.clone();
        endpoint.api_key = args.api_key.clone();
        endpoint.timeout = timeout;
        endpoint
    };

    let settings = ExecutionSettings {
        mode: args.mode,
        stop_loss_points: args.stop_points,
        reward_risk_ratio: args.reward_risk,
        risk_percent: args.risk_percent,
        point_value: args.point_value,
        ..Default::default()
    };

    let analyzer = Arc::new(
        AnalysisClient::new(endpoint(&args.analysis_url)).context("Failed to build analysis client")?,
    );

    let executor: Arc<dyn TradeExecutor> = match args.mode {
        ExecutionMode::Simulation => Arc::new(SimulatedExecutor::new(settings.clone())),
        ExecutionMode::Remote => {
            info!("Execution service: {}", args.execution_url);
            Arc::new(
                ExecutionClient::new(endpoint(&args.execution_url), settings.clone())
                    .context("Failed to build execution client")?,
            )
        }
    };

    let config = StrategyConfig {
        account_equity: args.equity,
        ..Default::default()
    };
    config.validate().context("Invalid starting config")?;
    if config.account_equity <= 0.0 {
        warn!("Account equity is 0, signals will be logged but not traded until it is set");
    }

    let controller_settings = ControllerSettings {
        poll_interval: Duration::from_secs(args.poll_interval.max(1)),
        analysis_timeout: timeout,
        execution_timeout: timeout,
        point_value: settings.point_value,
    };

    let controller = StrategyController::new(analyzer, executor, config, controller_settings);

    if args.autostart {
        controller.enable().await;
    }

    let app = api::router(controller.clone()).layer(CorsLayer::new().allow_origin(Any));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    info!("Control API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.disable().await;
    info!("Controller stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}

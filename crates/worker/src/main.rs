use std::sync::Arc;

use chrono::Utc;
use shared::config::WorkerConfig;
use shared::event_dispatch::{EventDispatcher, HandlerContext};
use shared::gateways::{
    GoogleCalendarGateway, GoogleCalendarGatewayConfig, PushGateway, TwilioSmsGateway,
    TwilioSmsGatewayConfig, WebPushGateway, WebPushGatewayConfig,
};
use shared::llm::{LlmReliabilityConfig, OpenRouterGatewayConfig, ReliableOpenRouterGateway};
use shared::pubsub::PubSubBus;
use shared::reactive::alarm_triggered_transport;
use shared::repos::Store;
use tokio::signal;
use tokio::time::{self, Duration};
use tracing::{error, info};
use uuid::Uuid;

mod cron;
mod job_actions;
mod job_processing;
mod retry;
mod types;

use job_processing::{JobRuntime, process_due_jobs};
pub(crate) use retry::retry_delay_seconds;
pub(crate) use types::{FailureClass, JobExecutionError, WorkerTickMetrics};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "worker=debug".to_string()))
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read worker config: {err}");
            std::process::exit(1);
        }
    };

    let store = match Store::connect(&config.database_url, config.database_max_connections).await
    {
        Ok(store) => store,
        Err(err) => {
            error!("failed to connect to postgres: {err}");
            std::process::exit(1);
        }
    };

    let pubsub = match PubSubBus::connect(&config.redis_url).await {
        Ok(pubsub) => pubsub,
        Err(err) => {
            error!("failed to connect to redis: {err}");
            std::process::exit(1);
        }
    };

    let llm_gateway = match build_llm_gateway() {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("failed to build LLM gateway: {err}");
            std::process::exit(1);
        }
    };

    let calendar_gateway = match GoogleCalendarGatewayConfig::from_env() {
        Ok(cfg) => GoogleCalendarGateway::new(cfg),
        Err(err) => {
            error!("failed to read Google calendar gateway config: {err}");
            std::process::exit(1);
        }
    };

    let sms_gateway = match TwilioSmsGatewayConfig::from_env() {
        Ok(cfg) => TwilioSmsGateway::new(cfg),
        Err(err) => {
            error!("failed to read Twilio SMS gateway config: {err}");
            std::process::exit(1);
        }
    };

    let push_gateway: Arc<dyn PushGateway> = match WebPushGatewayConfig::from_env() {
        Ok(cfg) => Arc::new(WebPushGateway::new(cfg)),
        Err(err) => {
            error!("failed to read web push gateway config: {err}");
            std::process::exit(1);
        }
    };

    let dispatcher = EventDispatcher::new(
        HandlerContext {
            store: store.clone(),
            pubsub: pubsub.clone(),
            push_gateway: push_gateway.clone(),
        },
        vec![alarm_triggered_transport()],
    );

    let worker_id = Uuid::new_v4();
    info!(%worker_id, "worker starting (base tick every 60 seconds)");

    let mut ticker = time::interval(Duration::from_secs(60));

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                cron::run_cron_tick(&store, Utc::now()).await;
                process_due_jobs(
                    JobRuntime {
                        store: &store,
                        dispatcher: &dispatcher,
                        pubsub: &pubsub,
                        config: &config,
                        llm_gateway: &llm_gateway,
                        calendar_gateway: &calendar_gateway,
                        sms_gateway: &sms_gateway,
                        push_gateway: push_gateway.as_ref(),
                    },
                    worker_id,
                )
                .await;
            }
        }
    }
}

fn build_llm_gateway() -> Result<ReliableOpenRouterGateway, String> {
    let openrouter_config = OpenRouterGatewayConfig::from_env().map_err(|err| err.to_string())?;
    let reliability_config = LlmReliabilityConfig::from_env().map_err(|err| err.to_string())?;
    ReliableOpenRouterGateway::from_openrouter_config(openrouter_config, reliability_config)
        .map_err(|err| err.to_string())
}

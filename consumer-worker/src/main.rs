use std::sync::Arc;

use aws_sdk_sqs::Client as SqsClient;
use clap::Parser;
use sqs_consumer::{Consumer, ConsumerRegistry, MessageHandler, QueueGateway, SqsGateway};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use consumer_worker::config::{Args, WorkerConfig};
use consumer_worker::handler::LoggingHandler;
use consumer_worker::health;
use consumer_worker::types::Environment;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Get environment
    let env = Environment::from_env();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    if env.json_logs() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let args = Args::parse();
    let config = WorkerConfig::resolve(&args)?;
    info!("Starting Consumer Worker in {:?} environment", env);

    let aws_config = env
        .aws_config(config.region.as_deref(), config.endpoint_url.as_deref())
        .await;
    let gateway: Arc<dyn QueueGateway> =
        Arc::new(SqsGateway::new(Arc::new(SqsClient::new(&aws_config))));
    let handler: Arc<dyn MessageHandler> = Arc::new(LoggingHandler);

    let consumers = config
        .consumers
        .into_iter()
        .map(|settings| {
            Consumer::new(
                Arc::clone(&gateway),
                settings.into_consumer_config(Arc::clone(&handler)),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let registry = ConsumerRegistry::new(consumers);
    let shutdown_token = registry.shutdown_token();

    // Start health check server
    let health_shutdown = shutdown_token.clone();
    let consumer_count = registry.len();
    let failed_consumers = registry.failed_consumers();
    tokio::spawn(async move {
        if let Err(e) =
            health::start_health_server(consumer_count, failed_consumers, health_shutdown).await
        {
            error!("Health server error: {}", e);
        }
    });

    // Spawn signal handler
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                signal_shutdown.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    let failures = registry.run().await;
    shutdown_token.cancel();

    if !failures.is_empty() {
        for failure in &failures {
            error!(
                queue_name = %failure.queue_name,
                "Consumer failed: {}", failure.error
            );
        }
        anyhow::bail!("{} consumer(s) failed", failures.len());
    }

    info!("Consumer Worker stopped");
    Ok(())
}

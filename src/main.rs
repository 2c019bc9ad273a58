use std::sync::Arc;

use anyhow::{Error, Result};
use notification_relay::{
    api::{AppState, router, run_api_server},
    clients::{
        database::DatabaseClient, email::SmtpSender, health::HealthChecker,
        rbmq::RabbitMqClient, sender::NotificationSender, sms::TwilioSender,
    },
    config::Config,
    context::{AppContext, QueueRoutes},
    gateway::Gateway,
    models::status::Channel,
    utils::{init_tracing, run_with_background, shutdown_signal},
    worker::DeliveryWorker,
};
use tracing::{error, info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %format!("{:#}", e), "Initialization error");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> Result<(), Error> {
    info!(role = ?config.service_role, "Starting notification relay");

    let database = DatabaseClient::connect(&config).await?;
    if config.service_role.channel().is_none() {
        database.ensure_schema().await?;
    }

    let rabbitmq = Arc::new(RabbitMqClient::connect(&config).await?);
    let context = AppContext::new(Arc::new(database), rabbitmq.clone());
    let health_checker = HealthChecker::new(context.clone());

    match config.service_role.channel() {
        None => {
            let gateway = Gateway::new(context, QueueRoutes::from_config(&config));
            let app = router(AppState::new(health_checker).with_gateway(gateway));

            run_api_server(app, config.server_port, shutdown_signal()).await?;
        }
        Some(channel) => {
            let sender: Arc<dyn NotificationSender> = match channel {
                Channel::Email => Arc::new(SmtpSender::new(&config)?),
                Channel::Sms => Arc::new(TwilioSender::new(&config)),
            };
            let queue = config.queue_name(channel).to_string();

            let worker = DeliveryWorker::new(
                context,
                sender,
                config.retry_policy(channel),
                queue.clone(),
                config.send_timeout(),
            );

            let consumer_tag = format!("{}_worker_{}", channel, Uuid::new_v4());
            let consumer = rabbitmq.create_consumer(&queue, &consumer_tag).await?;

            let app = router(AppState::new(health_checker));
            let server = tokio::spawn(run_api_server(app, config.server_port, shutdown_signal()));

            run_with_background(
                worker.run(RabbitMqClient::messages(consumer), shutdown_signal()),
                server,
            )
            .await?;
        }
    }

    if let Err(e) = rabbitmq.close().await {
        warn!(error = %e, "RabbitMQ connection did not close cleanly");
    }

    info!("Notification relay stopped");

    Ok(())
}

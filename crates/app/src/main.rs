use std::{sync::Arc, time::Duration};

use api_types::events::Channel;
use migration::{Migrator, MigratorTrait};
use pipeline::{Broker, OutboxRelay, Publisher, Worker};
use sea_orm::ConnectOptions;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "fincore={level},engine={level},pipeline={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect_database(&settings.database).await?;
    let engine = Arc::new(
        engine::Engine::builder()
            .database(db)
            .dedup_budget_alerts(settings.alerts.dedup_budget_alerts)
            .build()
            .await?,
    );

    // Owned here and closed on shutdown; everything else gets a clone.
    let broker = Broker::new();

    for channel in Channel::ALL {
        let worker = Worker::new(
            channel,
            engine.clone(),
            broker.clone(),
            settings.pipeline.worker(),
        );
        tasks.spawn(async move {
            if let Err(err) = worker.run().await {
                tracing::error!(%channel, "worker failed: {err}");
            }
        });
    }

    let relay = OutboxRelay::new(
        engine.clone(),
        Publisher::new(broker.clone()),
        settings.pipeline.relay(),
    );
    tasks.spawn(relay.run());

    tracing::info!(workers = Channel::ALL.len(), "fincore pipeline running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");
    broker.close().await;

    while tasks.join_next().await.is_some() {}

    Ok(())
}

async fn connect_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    tracing::info!(url = %config.url, "database ready");
    Ok(database)
}

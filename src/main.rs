//! APRS recorder utility

use aprs_recorder::{
    config::{AppConfig, MqttConfig},
    database::Database,
    errors::RecorderError,
    mqtt::{MqttClient, MqttClientBuilder},
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), RecorderError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Configuration file first, environment variables override
    let config = AppConfig::load()?;

    // Schema is checked before any packet is accepted
    let db = Database::initialize(&config.database, config.freq_map()).await?;

    let result = record_from_mqtt(&config.mqtt, &db).await;
    info!("APRS recorder completed: {:?}", result);

    db.shutdown().await;

    result
}

async fn record_from_mqtt(config: &MqttConfig, database: &Database) -> Result<(), RecorderError> {
    let mqtt_client = MqttClientBuilder::new(config)?
        .connect(&config.topics)
        .await?;
    run_aprs_recorder(mqtt_client, database).await
}

/// Record packets until the feed ends or a shutdown signal arrives.
///
/// The signal is only observed between packets, so an insert in progress
/// always runs to completion.
async fn run_aprs_recorder(
    mut mqtt_client: MqttClient,
    database: &Database,
) -> Result<(), RecorderError> {
    let shutdown_signal = signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            message = mqtt_client.recv() => {
                match message {
                    Ok(Some(msg)) => database.process_message(msg).await,
                    Ok(None) => break, // Channel closed
                    Err(e) => {
                        error!("MQTT receive error: {}", e);
                        break;
                    }
                }
            }
            _ = &mut shutdown_signal => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

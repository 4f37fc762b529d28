//! Errors for APRS recorder
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("MQTT connection failed")]
    MqttConnectionError(#[from] rumqttc::ConnectionError),

    #[error("MQTT client error")]
    MqttClientError(#[from] rumqttc::ClientError),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigLoadError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Invalid topic")]
    InvalidTopic(String),

    #[error("Invalid channel")]
    InvalidChannel(String),

    #[error("Unable to connect to database {database}: {origin}")]
    ConnectError {
        database: String,
        origin: sqlx::Error,
    },

    #[error("Schema migration failed: {origin}")]
    SchemaError { sql: String, origin: sqlx::Error },

    #[error("Error inserting packet: {origin}")]
    InsertError { sql: String, origin: sqlx::Error },

    #[error("Insert without telemetry and comment also failed: {origin} (first attempt: {first})")]
    InsertRetryError {
        sql: String,
        first: Box<RecorderError>,
        origin: sqlx::Error,
    },
}

impl RecorderError {
    /// SQL text of the statement that failed, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::SchemaError { sql, .. }
            | Self::InsertError { sql, .. }
            | Self::InsertRetryError { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// True when the underlying store error means the session itself is gone
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::InsertError { origin, .. }
            | Self::InsertRetryError { origin, .. }
            | Self::SchemaError { origin, .. } => matches!(
                origin,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_error_reports_both_failures() {
        let first = RecorderError::InsertError {
            sql: "INSERT".to_string(),
            origin: sqlx::Error::Encode("bad telemetry".into()),
        };
        let err = RecorderError::InsertRetryError {
            sql: "INSERT".to_string(),
            first: Box::new(first),
            origin: sqlx::Error::Encode("bad raw".into()),
        };

        let message = err.to_string();
        assert!(message.contains("bad raw"));
        assert!(message.contains("bad telemetry"));
        assert_eq!(err.sql(), Some("INSERT"));
    }

    #[test]
    fn io_errors_mean_lost_connection() {
        let lost = RecorderError::InsertError {
            sql: String::new(),
            origin: sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
        };
        let rejected = RecorderError::InsertError {
            sql: String::new(),
            origin: sqlx::Error::Encode("rejected".into()),
        };

        assert!(lost.is_connection_lost());
        assert!(!rejected.is_connection_lost());
    }
}

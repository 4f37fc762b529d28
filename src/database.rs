// src/database.rs
pub mod insert;
pub mod models;
pub mod schema;
pub mod types;

use sqlx::{Connection, PgConnection};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    config::DatabaseConfig,
    errors::RecorderError,
    freqmap::FreqMap,
    models::{AudioLevel, DecodedPacket, ReceivedPacket},
};
use insert::InsertOutcome;
use schema::{SchemaChange, TableSchema};

enum ConnectionState {
    Disconnected,
    Connected(PgConnection),
    /// The session broke while in use; packets are skipped from here on
    Failed(String),
}

/// The single session to the packet store
pub struct StoreConnection {
    state: ConnectionState,
    database: String,
}

impl StoreConnection {
    /// Open a session and bring the packets table up to date.
    ///
    /// A connection whose schema cannot be made current is closed again
    /// rather than handed out.
    pub async fn connect(
        config: &DatabaseConfig,
        schema: &TableSchema,
    ) -> Result<Self, RecorderError> {
        config.validate()?;

        info!(
            "Connecting to database {} on {}",
            config.dbname,
            config.host().unwrap_or("local socket")
        );
        let mut conn = PgConnection::connect_with(&config.connect_options())
            .await
            .map_err(|origin| {
                error!("Unable to connect to database {}: {}", config.dbname, origin);
                RecorderError::ConnectError {
                    database: config.dbname.clone(),
                    origin,
                }
            })?;
        info!("Connection to database {} successful", config.dbname);

        match sqlx::query_scalar::<_, String>("SHOW client_encoding")
            .fetch_one(&mut conn)
            .await
        {
            Ok(encoding) => info!("Database client_encoding: {}", encoding),
            Err(e) => warn!("Could not read client_encoding: {}", e),
        }

        match schema::ensure_schema(&mut conn, schema).await {
            Ok(change) => debug!("Schema check finished: {:?}", change),
            Err(e) => {
                if let Err(close_err) = conn.close().await {
                    warn!("Error closing database connection: {}", close_err);
                }
                return Err(e);
            }
        }

        Ok(Self {
            state: ConnectionState::Connected(conn),
            database: config.dbname.clone(),
        })
    }

    /// Release the session. Safe to call in any state, any number of times.
    pub async fn disconnect(&mut self) {
        match std::mem::replace(&mut self.state, ConnectionState::Disconnected) {
            ConnectionState::Connected(conn) => {
                info!("Closing connection to database {}", self.database);
                if let Err(e) = conn.close().await {
                    warn!("Error closing database connection: {}", e);
                }
            }
            ConnectionState::Failed(reason) => {
                debug!("Discarding failed database connection: {}", reason)
            }
            ConnectionState::Disconnected => debug!("Database already disconnected"),
        }
    }

    fn session(&mut self) -> Result<&mut PgConnection, String> {
        match &mut self.state {
            ConnectionState::Connected(conn) => Ok(conn),
            ConnectionState::Failed(reason) => Err(reason.clone()),
            ConnectionState::Disconnected => Err("not connected".to_string()),
        }
    }

    fn fail(&mut self, reason: String) {
        self.state = ConnectionState::Failed(reason);
    }
}

/// Recording session: connection, instance id, frequency map and table
pub struct Database {
    connection: Mutex<StoreConnection>,
    schema: TableSchema,
    insert_sql: String,
    instance: i32,
    freq_map: FreqMap,
}

impl Database {
    /// Connect, migrate the schema and get ready to record packets
    pub async fn initialize(
        config: &DatabaseConfig,
        freq_map: FreqMap,
    ) -> Result<Self, RecorderError> {
        let schema = TableSchema::new(&config.table);
        let connection = StoreConnection::connect(config, &schema).await?;

        info!(
            "Recording packets to table {} as instance {}, {} frequency map entries",
            schema.table(),
            config.instance,
            freq_map.len()
        );

        Ok(Self {
            connection: Mutex::new(connection),
            insert_sql: schema.insert_sql(),
            schema,
            instance: config.instance,
            freq_map,
        })
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Process a packet delivered by the feed
    pub async fn process_message(&self, message: ReceivedPacket) {
        self.record_packet(message.channel, &message.packet, message.levels)
            .await
    }

    /// Store one received packet.
    ///
    /// Failures are logged and never returned; a packet that cannot be
    /// stored even without telemetry and comment is dropped.
    pub async fn record_packet(&self, channel: i32, packet: &DecodedPacket, levels: AudioLevel) {
        let row = models::build_row(self.instance, channel, packet, levels, &self.freq_map);

        let mut connection = self.connection.lock().await;
        let conn = match connection.session() {
            Ok(conn) => conn,
            Err(reason) => {
                error!(
                    "Database unavailable ({}), packet from {} not recorded",
                    reason, row.callsign
                );
                return;
            }
        };

        match insert::insert_with_retry(conn, &self.insert_sql, row.clone()).await {
            InsertOutcome::Stored => {
                debug!("Recorded packet from {} on channel {}", row.callsign, channel)
            }
            InsertOutcome::StoredDegraded(first) => {
                warn!("Error inserting data into {}: {}", self.table(), first);
                warn!("SQL: {}", insert::describe_statement(&self.insert_sql, &row));
                warn!(
                    "Recorded packet from {} without telemetry and comment fields",
                    row.callsign
                );
            }
            InsertOutcome::Dropped(err) => {
                error!("Packet from {} dropped: {}", row.callsign, err);
                error!("SQL: {}", insert::describe_statement(&self.insert_sql, &row));
                if err.is_connection_lost() {
                    error!("Connection to database lost");
                    connection.fail(err.to_string());
                }
            }
        }
    }

    /// Close the session, safe to call more than once
    pub async fn shutdown(&self) {
        self.connection.lock().await.disconnect().await;
    }
}

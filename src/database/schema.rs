//! Additive schema migration for the packets table

use sqlx::PgConnection;
use tracing::{error, info};

use crate::errors::RecorderError;

/// A column of the packets table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
    /// Added to existing tables when missing
    pub evolvable: bool,
}

const fn column(name: &'static str, sql_type: &'static str) -> Column {
    Column {
        name,
        sql_type,
        evolvable: false,
    }
}

const fn evolvable(name: &'static str, sql_type: &'static str) -> Column {
    Column {
        name,
        sql_type,
        evolvable: true,
    }
}

/// Every column, in insert order
pub const COLUMNS: &[Column] = &[
    column("instance", "int"),
    column("channel", "int"),
    column("tm", "timestamp with time zone"),
    column("sdr", "int"),
    column("freq", "int"),
    column("callsign", "text"),
    column("heardfrom", "text"),
    column("sourcename", "text"),
    column("source_symbol", "text"),
    column("speed_mph", "decimal"),
    column("bearing", "decimal"),
    column("altitude", "decimal"),
    column("manufacturer", "text"),
    column("status", "text"),
    column("telemetry", "text"),
    column("comment", "text"),
    column("location2d", "geometry(POINT, 4326)"),
    column("location3d", "geometry(POINTZ, 4326)"),
    column("raw", "text"),
    column("hash", "text"),
    evolvable("receive_level", "int"),
    evolvable("mark_level", "int"),
    evolvable("space_level", "int"),
];

const PRIMARY_KEY: &[&str] = &["instance", "channel", "tm", "callsign"];

const INDEXED: &[&str] = &["callsign", "hash", "freq"];

/// What `ensure_schema` had to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    Created,
    Patched(Vec<&'static str>),
    Current,
}

/// Layout of the packets table under a given name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
}

impl TableSchema {
    /// `table` must already be a validated plain identifier
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn evolvable_columns(&self) -> impl Iterator<Item = &'static Column> {
        COLUMNS.iter().filter(|c| c.evolvable)
    }

    /// Table, primary key and lookup indexes in one batch
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = COLUMNS
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect();
        let mut sql = format!(
            "CREATE TABLE {} ({}, PRIMARY KEY ({}));",
            self.table,
            columns.join(", "),
            PRIMARY_KEY.join(", ")
        );
        for indexed in INDEXED {
            sql.push_str(&format!(
                " CREATE INDEX {table}_{col}_idx ON {table} ({col});",
                table = self.table,
                col = indexed
            ));
        }
        sql
    }

    /// Evolvable columns absent from `existing`
    pub fn missing_columns(&self, existing: &[String]) -> Vec<&'static Column> {
        self.evolvable_columns()
            .filter(|c| !existing.iter().any(|name| name == c.name))
            .collect()
    }

    /// One combined statement adding `missing`, None when nothing is missing
    pub fn add_columns_sql(&self, missing: &[&Column]) -> Option<String> {
        if missing.is_empty() {
            return None;
        }
        let clauses: Vec<String> = missing
            .iter()
            .map(|c| format!("ADD COLUMN IF NOT EXISTS {} {}", c.name, c.sql_type))
            .collect();
        Some(format!("ALTER TABLE {} {};", self.table, clauses.join(", ")))
    }

    /// Parameterized insert covering every column
    pub fn insert_sql(&self) -> String {
        let names: Vec<&str> = COLUMNS.iter().map(|c| c.name).collect();
        let values: Vec<String> = COLUMNS
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let param = i + 1;
                match c.name {
                    "location2d" | "location3d" => format!("ST_GeomFromText(${}, 4326)", param),
                    "hash" => format!("md5(${})", param),
                    _ => format!("${}", param),
                }
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            values.join(", ")
        )
    }
}

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name::text = $1)";

const EXISTING_COLUMNS_SQL: &str = "SELECT column_name::text FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name::text = $1 AND column_name::text = ANY($2)";

/// Make sure the packets table exists with every evolvable column.
///
/// Only ever adds structure, so running it again after a partial failure
/// picks up where the last run stopped.
pub async fn ensure_schema(
    conn: &mut PgConnection,
    schema: &TableSchema,
) -> Result<SchemaChange, RecorderError> {
    let exists = sqlx::query_scalar::<_, bool>(TABLE_EXISTS_SQL)
        .bind(schema.table())
        .fetch_one(&mut *conn)
        .await
        .map_err(|origin| schema_error(TABLE_EXISTS_SQL, origin))?;

    if !exists {
        let sql = schema.create_sql();
        sqlx::raw_sql(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|origin| schema_error(&sql, origin))?;
        info!("Table {} created", schema.table());
        return Ok(SchemaChange::Created);
    }

    let wanted: Vec<String> = schema
        .evolvable_columns()
        .map(|c| c.name.to_string())
        .collect();
    let existing = sqlx::query_scalar::<_, String>(EXISTING_COLUMNS_SQL)
        .bind(schema.table())
        .bind(wanted)
        .fetch_all(&mut *conn)
        .await
        .map_err(|origin| schema_error(EXISTING_COLUMNS_SQL, origin))?;

    let missing = schema.missing_columns(&existing);
    let Some(sql) = schema.add_columns_sql(&missing) else {
        info!("Table {} is up to date", schema.table());
        return Ok(SchemaChange::Current);
    };

    sqlx::raw_sql(&sql)
        .execute(&mut *conn)
        .await
        .map_err(|origin| schema_error(&sql, origin))?;

    let added: Vec<&'static str> = missing.iter().map(|c| c.name).collect();
    info!("Columns {:?} added to table {}", added, schema.table());
    Ok(SchemaChange::Patched(added))
}

fn schema_error(sql: &str, origin: sqlx::Error) -> RecorderError {
    error!("Schema migration failed: {}", origin);
    error!("SQL: {}", sql);
    RecorderError::SchemaError {
        sql: sql.to_string(),
        origin,
    }
}

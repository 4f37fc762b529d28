//! Packet insert with a single degraded retry
//!
//! A row goes through at most two attempts:
//!
//! - `Full`: every mapped field is written.
//! - `Degraded`: telemetry and comment are forced to NULL, since those
//!   free-form fields are the ones a store most often rejects.
//!
//! If the degraded attempt fails too, the row is dropped. Nothing here is
//! fatal to the recorder.

use sqlx::PgConnection;

use super::models::PacketRow;
use crate::errors::RecorderError;

/// Final result of writing one row
#[derive(Debug)]
pub enum InsertOutcome {
    Stored,
    /// Stored without telemetry and comment, after the first attempt failed
    StoredDegraded(RecorderError),
    /// Both attempts failed, the error carries both failures
    Dropped(RecorderError),
}

/// Attempt currently in flight
#[derive(Debug)]
pub enum InsertAttempt {
    Full(PacketRow),
    Degraded {
        row: PacketRow,
        first: RecorderError,
    },
}

/// Transition after an attempt finished
#[derive(Debug)]
pub enum Step {
    Retry(InsertAttempt),
    Done(InsertOutcome),
}

impl InsertAttempt {
    pub fn new(row: PacketRow) -> Self {
        Self::Full(row)
    }

    /// Row to write for this attempt
    pub fn row(&self) -> &PacketRow {
        match self {
            Self::Full(row) | Self::Degraded { row, .. } => row,
        }
    }

    /// Advance with the result of writing `self.row()` using `sql`
    pub fn advance(self, sql: &str, result: Result<(), sqlx::Error>) -> Step {
        match (self, result) {
            (Self::Full(_), Ok(())) => Step::Done(InsertOutcome::Stored),
            (Self::Full(row), Err(origin)) => Step::Retry(Self::Degraded {
                row: row.degraded(),
                first: RecorderError::InsertError {
                    sql: sql.to_string(),
                    origin,
                },
            }),
            (Self::Degraded { first, .. }, Ok(())) => {
                Step::Done(InsertOutcome::StoredDegraded(first))
            }
            (Self::Degraded { first, .. }, Err(origin)) => {
                Step::Done(InsertOutcome::Dropped(RecorderError::InsertRetryError {
                    sql: sql.to_string(),
                    first: Box::new(first),
                    origin,
                }))
            }
        }
    }
}

/// Write one row, binding every value as a statement parameter
pub async fn insert_row(
    conn: &mut PgConnection,
    sql: &str,
    row: &PacketRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(sql)
        .bind(row.instance)
        .bind(row.channel)
        .bind(row.tm)
        .bind(row.sdr)
        .bind(row.freq)
        .bind(&row.callsign)
        .bind(&row.heardfrom)
        .bind(&row.sourcename)
        .bind(&row.source_symbol)
        .bind(row.speed_mph)
        .bind(row.bearing)
        .bind(row.altitude)
        .bind(&row.manufacturer)
        .bind(&row.status)
        .bind(&row.telemetry)
        .bind(&row.comment)
        .bind(&row.location2d)
        .bind(&row.location3d)
        .bind(&row.raw)
        .bind(&row.info)
        .bind(row.receive_level)
        .bind(row.mark_level)
        .bind(row.space_level)
        .execute(conn)
        .await?;
    Ok(())
}

/// Statement text with the values bound to it, for logging a failed insert
pub fn describe_statement(sql: &str, row: &PacketRow) -> String {
    format!("{} with values {:?}", sql, row)
}

/// Run the attempt sequence for `row` to completion
pub async fn insert_with_retry(
    conn: &mut PgConnection,
    sql: &str,
    row: PacketRow,
) -> InsertOutcome {
    let mut attempt = InsertAttempt::new(row);
    loop {
        let result = insert_row(conn, sql, attempt.row()).await;
        match attempt.advance(sql, result) {
            Step::Retry(next) => attempt = next,
            Step::Done(outcome) => return outcome,
        }
    }
}

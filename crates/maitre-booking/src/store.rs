//! SQLite-backed implementation of the booking interface.
//!
//! One calendar resource: a (date, time) pair can be booked once,
//! whatever the service. Double-booking is prevented by a UNIQUE index,
//! so concurrent booking attempts for the same slot race safely — the
//! loser gets `Unavailable`, not a duplicate row.

use crate::schedule::SlotGrid;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use maitre_core::{
    booking::{Appointment, BookingContext, BookingOutcome, CancelOutcome, Slot},
    config::BookingConfig,
    error::MaitreError,
    shellexpand,
    traits::BookingService,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";

/// Appointment store plus the slot grid availability is computed against.
pub struct BookingStore {
    pool: SqlitePool,
    grid: SlotGrid,
}

impl BookingStore {
    /// Create the store, initializing the schema on first use.
    pub async fn new(config: &BookingConfig) -> Result<Self, MaitreError> {
        let grid = SlotGrid::from_config(config)?;
        let db_path = shellexpand(&config.db_path);

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MaitreError::Booking(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| MaitreError::Booking(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| MaitreError::Booking(format!("failed to connect to sqlite: {e}")))?;

        Self::init_schema(&pool).await?;
        info!("Booking store initialized at {db_path}");

        Ok(Self { pool, grid })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), MaitreError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS appointments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                user_name TEXT,
                service TEXT,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'booked',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_slot
                ON appointments(date, time) WHERE status = 'booked';
            CREATE INDEX IF NOT EXISTS idx_appointments_user
                ON appointments(user_id, status);",
        )
        .execute(pool)
        .await
        .map_err(|e| MaitreError::Booking(format!("schema init failed: {e}")))?;
        Ok(())
    }

    async fn booked_times(&self, date: NaiveDate) -> Result<Vec<NaiveTime>, MaitreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT time FROM appointments WHERE date = ? AND status = 'booked'",
        )
        .bind(date.format(DATE_FMT).to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MaitreError::Booking(format!("query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(|(t,)| NaiveTime::parse_from_str(&t, TIME_FMT).ok())
            .collect())
    }
}

#[async_trait]
impl BookingService for BookingStore {
    async fn query_availability(
        &self,
        date: NaiveDate,
        service: Option<&str>,
    ) -> Result<Vec<Slot>, MaitreError> {
        let taken = self.booked_times(date).await?;
        let slots = self
            .grid
            .times()
            .into_iter()
            .filter(|t| !taken.contains(t))
            .map(|time| Slot {
                date,
                time,
                service: service.map(str::to_string),
            })
            .collect();
        Ok(slots)
    }

    async fn book(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        service: Option<&str>,
        ctx: &BookingContext,
    ) -> Result<BookingOutcome, MaitreError> {
        if !self.grid.contains(time) {
            return Ok(BookingOutcome::Unavailable);
        }

        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let result = sqlx::query(
            "INSERT INTO appointments (id, user_id, user_name, service, date, time, status) \
             VALUES (?, ?, ?, ?, ?, ?, 'booked')",
        )
        .bind(&id)
        .bind(&ctx.user_id)
        .bind(&ctx.user_name)
        .bind(service)
        .bind(date.format(DATE_FMT).to_string())
        .bind(time.format(TIME_FMT).to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(BookingOutcome::Confirmed(Appointment {
                id,
                user_id: ctx.user_id.clone(),
                date,
                time,
                service: service.map(str::to_string),
            })),
            // UNIQUE violation on (date, time) — slot taken in the meantime.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(BookingOutcome::Unavailable)
            }
            Err(e) => Err(MaitreError::Booking(format!("insert failed: {e}"))),
        }
    }

    async fn cancel(&self, appointment_id: &str) -> Result<CancelOutcome, MaitreError> {
        let result = sqlx::query(
            "UPDATE appointments SET status = 'cancelled' \
             WHERE id = ? AND status = 'booked'",
        )
        .bind(appointment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MaitreError::Booking(format!("update failed: {e}")))?;

        if result.rows_affected() > 0 {
            Ok(CancelOutcome::Cancelled)
        } else {
            Ok(CancelOutcome::NotFound)
        }
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Appointment>, MaitreError> {
        let rows: Vec<(String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, date, time, service FROM appointments \
             WHERE user_id = ? AND status = 'booked' AND date >= date('now') \
             ORDER BY date, time",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MaitreError::Booking(format!("query failed: {e}")))?;

        let appointments = rows
            .into_iter()
            .filter_map(|(id, date, time, service)| {
                let date = NaiveDate::parse_from_str(&date, DATE_FMT).ok()?;
                let time = NaiveTime::parse_from_str(&time, TIME_FMT).ok()?;
                Some(Appointment {
                    id,
                    user_id: user_id.to_string(),
                    date,
                    time,
                    service,
                })
            })
            .collect();

        Ok(appointments)
    }
}

//! PostgreSQL store implementation.
//!
//! Row mapping follows the plain-query + `Row::get` style; the seat lists,
//! seating histories and satellite round lists are persisted as JSONB.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::{Store, StoreError, StoreResult};
use crate::draw::models::{
    Day, DayId, DayStatus, Event, EventId, EventStatus, MainRound, Room, SatelliteId,
    SatelliteRound, SatelliteTicket, TABLES_PER_ROOM, Table, Ticket, TicketId, UserId, Winner,
};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
}

impl StoreConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 20)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    ///
    /// # Panics
    ///
    /// Panics if `DATABASE_URL` is not set
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            connection_timeout_secs: env::var("DB_CONNECTION_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS raffle_events (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    main JSONB,
    satellites JSONB NOT NULL DEFAULT '[]',
    entry BIGINT NOT NULL DEFAULT 0,
    winner BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS raffle_days (
    id BIGSERIAL PRIMARY KEY,
    event_id UUID NOT NULL,
    daynumber INT NOT NULL,
    status TEXT NOT NULL,
    entry BIGINT NOT NULL DEFAULT 0,
    winner BIGINT NOT NULL DEFAULT 0,
    UNIQUE (event_id, daynumber)
);

CREATE TABLE IF NOT EXISTS raffle_rooms (
    day_id BIGINT NOT NULL,
    roomnumber INT NOT NULL,
    drawn BOOLEAN NOT NULL DEFAULT FALSE,
    PRIMARY KEY (day_id, roomnumber)
);

CREATE TABLE IF NOT EXISTS raffle_tables (
    day_id BIGINT NOT NULL,
    table_no INT NOT NULL,
    seats JSONB NOT NULL,
    PRIMARY KEY (day_id, table_no)
);

CREATE TABLE IF NOT EXISTS raffle_tickets (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    event_id UUID NOT NULL,
    satellite_id UUID,
    day INT NOT NULL DEFAULT 1,
    history JSONB NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_raffle_tickets_event_day ON raffle_tickets (event_id, day);

CREATE TABLE IF NOT EXISTS raffle_satellite_tickets (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    event_id UUID NOT NULL,
    satellite_id UUID NOT NULL,
    promoted BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS raffle_winners (
    event_id UUID NOT NULL,
    user_id BIGINT NOT NULL,
    tickets JSONB NOT NULL DEFAULT '[]',
    PRIMARY KEY (event_id, user_id)
);
"#;

/// PostgreSQL [`Store`] implementation
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn event_status_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Draft => "draft",
        EventStatus::Active => "active",
        EventStatus::Completed => "completed",
        EventStatus::Archived => "archived",
    }
}

fn parse_event_status(s: &str) -> StoreResult<EventStatus> {
    match s {
        "draft" => Ok(EventStatus::Draft),
        "active" => Ok(EventStatus::Active),
        "completed" => Ok(EventStatus::Completed),
        "archived" => Ok(EventStatus::Archived),
        other => Err(StoreError::Corrupt(format!(
            "unknown event status: {other}"
        ))),
    }
}

fn day_status_str(status: DayStatus) -> &'static str {
    match status {
        DayStatus::Pending => "pending",
        DayStatus::Active => "active",
        DayStatus::Ended => "ended",
    }
}

fn parse_day_status(s: &str) -> StoreResult<DayStatus> {
    match s {
        "pending" => Ok(DayStatus::Pending),
        "active" => Ok(DayStatus::Active),
        "ended" => Ok(DayStatus::Ended),
        other => Err(StoreError::Corrupt(format!("unknown day status: {other}"))),
    }
}

impl PgStore {
    /// Connect to PostgreSQL and create the schema if it does not exist yet
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(&config.database_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn event_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Event> {
        let status: String = row.get("status");
        let main: Option<serde_json::Value> = row.get("main");
        let satellites: serde_json::Value = row.get("satellites");
        Ok(Event {
            id: row.get("id"),
            name: row.get("name"),
            status: parse_event_status(&status)?,
            main: main
                .map(serde_json::from_value::<MainRound>)
                .transpose()?,
            satellites: serde_json::from_value::<Vec<SatelliteRound>>(satellites)?,
            entry: row.get::<i64, _>("entry") as u64,
            winner: row.get::<i64, _>("winner") as u64,
        })
    }

    fn day_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Day> {
        let status: String = row.get("status");
        Ok(Day {
            id: row.get("id"),
            event_id: row.get("event_id"),
            number: row.get::<i32, _>("daynumber") as u32,
            status: parse_day_status(&status)?,
            entry: row.get::<i64, _>("entry") as u64,
            winner: row.get::<i64, _>("winner") as u64,
        })
    }

    fn table_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Table> {
        let seats: serde_json::Value = row.get("seats");
        Ok(Table {
            day_id: row.get("day_id"),
            number: row.get::<i32, _>("table_no") as u32,
            seats: serde_json::from_value(seats)?,
        })
    }

    fn ticket_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<Ticket> {
        let history: serde_json::Value = row.get("history");
        Ok(Ticket {
            id: row.get("id"),
            user_id: row.get("user_id"),
            event_id: row.get("event_id"),
            satellite_id: row.get("satellite_id"),
            day: row.get::<i32, _>("day") as u32,
            history: serde_json::from_value(history)?,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn current_event(&self) -> StoreResult<Option<Event>> {
        let row = sqlx::query(
            "SELECT id, name, status, main, satellites, entry, winner
             FROM raffle_events WHERE status != 'archived' LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::event_from_row(&r)).transpose()
    }

    async fn event(&self, id: EventId) -> StoreResult<Option<Event>> {
        let row = sqlx::query(
            "SELECT id, name, status, main, satellites, entry, winner
             FROM raffle_events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::event_from_row(&r)).transpose()
    }

    async fn save_event(&self, event: &Event) -> StoreResult<()> {
        let main = event.main.as_ref().map(serde_json::to_value).transpose()?;
        let satellites = serde_json::to_value(&event.satellites)?;
        sqlx::query(
            r#"
            INSERT INTO raffle_events (id, name, status, main, satellites, entry, winner)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = $2, status = $3, main = $4, satellites = $5, entry = $6, winner = $7
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event_status_str(event.status))
        .bind(main)
        .bind(satellites)
        .bind(event.entry as i64)
        .bind(event.winner as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn day(&self, event_id: EventId, number: u32) -> StoreResult<Option<Day>> {
        let row = sqlx::query(
            "SELECT id, event_id, daynumber, status, entry, winner
             FROM raffle_days WHERE event_id = $1 AND daynumber = $2",
        )
        .bind(event_id)
        .bind(number as i32)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::day_from_row(&r)).transpose()
    }

    async fn last_day(&self, event_id: EventId) -> StoreResult<Option<Day>> {
        let row = sqlx::query(
            "SELECT id, event_id, daynumber, status, entry, winner
             FROM raffle_days WHERE event_id = $1
             ORDER BY daynumber DESC LIMIT 1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::day_from_row(&r)).transpose()
    }

    async fn create_day(&self, event_id: EventId, number: u32) -> StoreResult<Day> {
        let row = sqlx::query(
            "INSERT INTO raffle_days (event_id, daynumber, status)
             VALUES ($1, $2, 'pending') RETURNING id",
        )
        .bind(event_id)
        .bind(number as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(Day {
            id: row.get("id"),
            event_id,
            number,
            status: DayStatus::Pending,
            entry: 0,
            winner: 0,
        })
    }

    async fn save_day(&self, day: &Day) -> StoreResult<()> {
        sqlx::query(
            "UPDATE raffle_days SET status = $1, entry = $2, winner = $3 WHERE id = $4",
        )
        .bind(day_status_str(day.status))
        .bind(day.entry as i64)
        .bind(day.winner as i64)
        .bind(day.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn room(&self, day_id: DayId, number: u32) -> StoreResult<Option<Room>> {
        let row = sqlx::query(
            "SELECT day_id, roomnumber, drawn FROM raffle_rooms
             WHERE day_id = $1 AND roomnumber = $2",
        )
        .bind(day_id)
        .bind(number as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Room {
            day_id: r.get("day_id"),
            number: r.get::<i32, _>("roomnumber") as u32,
            drawn: r.get("drawn"),
        }))
    }

    async fn rooms_for_day(&self, day_id: DayId) -> StoreResult<Vec<Room>> {
        let rows = sqlx::query(
            "SELECT day_id, roomnumber, drawn FROM raffle_rooms
             WHERE day_id = $1 ORDER BY roomnumber",
        )
        .bind(day_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Room {
                day_id: r.get("day_id"),
                number: r.get::<i32, _>("roomnumber") as u32,
                drawn: r.get("drawn"),
            })
            .collect())
    }

    async fn save_room(&self, room: &Room) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO raffle_rooms (day_id, roomnumber, drawn)
            VALUES ($1, $2, $3)
            ON CONFLICT (day_id, roomnumber) DO UPDATE SET drawn = $3
            "#,
        )
        .bind(room.day_id)
        .bind(room.number as i32)
        .bind(room.drawn)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn table_exists(&self, day_id: DayId, number: u32) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM raffle_tables WHERE day_id = $1 AND table_no = $2",
        )
        .bind(day_id)
        .bind(number as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn tables_for_day(&self, day_id: DayId) -> StoreResult<Vec<Table>> {
        let rows = sqlx::query(
            "SELECT day_id, table_no, seats FROM raffle_tables
             WHERE day_id = $1 ORDER BY table_no",
        )
        .bind(day_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::table_from_row).collect()
    }

    async fn tables_in_room(&self, day_id: DayId, room_number: u32) -> StoreResult<Vec<Table>> {
        let lo = (room_number * TABLES_PER_ROOM) as i32;
        let hi = ((room_number + 1) * TABLES_PER_ROOM) as i32;
        let rows = sqlx::query(
            "SELECT day_id, table_no, seats FROM raffle_tables
             WHERE day_id = $1 AND table_no >= $2 AND table_no < $3
             ORDER BY table_no",
        )
        .bind(day_id)
        .bind(lo)
        .bind(hi)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::table_from_row).collect()
    }

    async fn count_tables_in_room(&self, day_id: DayId, room_number: u32) -> StoreResult<usize> {
        let lo = (room_number * TABLES_PER_ROOM) as i32;
        let hi = ((room_number + 1) * TABLES_PER_ROOM) as i32;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM raffle_tables
             WHERE day_id = $1 AND table_no >= $2 AND table_no < $3",
        )
        .bind(day_id)
        .bind(lo)
        .bind(hi)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as usize)
    }

    async fn save_table(&self, table: &Table) -> StoreResult<()> {
        let seats = serde_json::to_value(&table.seats)?;
        sqlx::query(
            r#"
            INSERT INTO raffle_tables (day_id, table_no, seats)
            VALUES ($1, $2, $3)
            ON CONFLICT (day_id, table_no) DO UPDATE SET seats = $3
            "#,
        )
        .bind(table.day_id)
        .bind(table.number as i32)
        .bind(seats)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query(
            "SELECT id, user_id, event_id, satellite_id, day, history
             FROM raffle_tickets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::ticket_from_row(&r)).transpose()
    }

    async fn create_ticket(
        &self,
        user_id: UserId,
        event_id: EventId,
        satellite_id: Option<SatelliteId>,
    ) -> StoreResult<Ticket> {
        let row = sqlx::query(
            "INSERT INTO raffle_tickets (user_id, event_id, satellite_id)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(user_id)
        .bind(event_id)
        .bind(satellite_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Ticket {
            id: row.get("id"),
            user_id,
            event_id,
            satellite_id,
            day: 1,
            history: Vec::new(),
        })
    }

    async fn save_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        let history = serde_json::to_value(&ticket.history)?;
        sqlx::query("UPDATE raffle_tickets SET day = $1, history = $2 WHERE id = $3")
            .bind(ticket.day as i32)
            .bind(history)
            .bind(ticket.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn tickets_on_day(&self, event_id: EventId, day: u32) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query(
            "SELECT id, user_id, event_id, satellite_id, day, history
             FROM raffle_tickets WHERE event_id = $1 AND day = $2 ORDER BY id",
        )
        .bind(event_id)
        .bind(day as i32)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::ticket_from_row).collect()
    }

    async fn count_tickets(&self, event_id: EventId) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM raffle_tickets WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count as u64)
    }

    async fn count_tickets_past_day(&self, event_id: EventId, day: u32) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM raffle_tickets WHERE event_id = $1 AND day > $2",
        )
        .bind(event_id)
        .bind(day as i32)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn create_satellite_ticket(
        &self,
        user_id: UserId,
        event_id: EventId,
        satellite_id: SatelliteId,
    ) -> StoreResult<SatelliteTicket> {
        let row = sqlx::query(
            "INSERT INTO raffle_satellite_tickets (user_id, event_id, satellite_id)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(user_id)
        .bind(event_id)
        .bind(satellite_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SatelliteTicket {
            id: row.get("id"),
            user_id,
            event_id,
            satellite_id,
            promoted: false,
        })
    }

    async fn save_satellite_ticket(&self, ticket: &SatelliteTicket) -> StoreResult<()> {
        sqlx::query("UPDATE raffle_satellite_tickets SET promoted = $1 WHERE id = $2")
            .bind(ticket.promoted)
            .bind(ticket.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn satellite_tickets(
        &self,
        satellite_id: SatelliteId,
    ) -> StoreResult<Vec<SatelliteTicket>> {
        let rows = sqlx::query(
            "SELECT id, user_id, event_id, satellite_id, promoted
             FROM raffle_satellite_tickets WHERE satellite_id = $1 ORDER BY id",
        )
        .bind(satellite_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SatelliteTicket {
                id: r.get("id"),
                user_id: r.get("user_id"),
                event_id: r.get("event_id"),
                satellite_id: r.get("satellite_id"),
                promoted: r.get("promoted"),
            })
            .collect())
    }

    async fn winner(&self, event_id: EventId, user_id: UserId) -> StoreResult<Option<Winner>> {
        let row = sqlx::query(
            "SELECT event_id, user_id, tickets FROM raffle_winners
             WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let tickets: serde_json::Value = r.get("tickets");
            Ok(Winner {
                event_id: r.get("event_id"),
                user_id: r.get("user_id"),
                tickets: serde_json::from_value(tickets)?,
            })
        })
        .transpose()
    }

    async fn save_winner(&self, winner: &Winner) -> StoreResult<()> {
        let tickets = serde_json::to_value(&winner.tickets)?;
        sqlx::query(
            r#"
            INSERT INTO raffle_winners (event_id, user_id, tickets)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, user_id) DO UPDATE SET tickets = $3
            "#,
        )
        .bind(winner.event_id)
        .bind(winner.user_id)
        .bind(tickets)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn winners_for_event(&self, event_id: EventId) -> StoreResult<Vec<Winner>> {
        let rows = sqlx::query(
            "SELECT event_id, user_id, tickets FROM raffle_winners
             WHERE event_id = $1 ORDER BY user_id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let tickets: serde_json::Value = r.get("tickets");
                Ok(Winner {
                    event_id: r.get("event_id"),
                    user_id: r.get("user_id"),
                    tickets: serde_json::from_value(tickets)?,
                })
            })
            .collect()
    }
}

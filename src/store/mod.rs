//! Persistence abstraction for the raffle engine.
//!
//! The engine talks to a generic ticket store through the [`Store`] trait,
//! enabling dependency injection and testing against [`MemoryStore`] while
//! production deployments use [`PgStore`].

use async_trait::async_trait;
use thiserror::Error;

use crate::draw::models::{
    Day, DayId, Event, EventId, Room, SatelliteId, SatelliteTicket, Table, Ticket, TicketId,
    UserId, Winner,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::{PgStore, StoreConfig};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row could not be interpreted
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for the durable collections the engine mutates: events, days, rooms,
/// tables, tickets, satellite tickets and the winner ledger.
///
/// Writes are upserts keyed by each record's identity. Query methods that
/// return collections order by identity so packing passes walk a stable
/// sequence.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find the event currently running (any status short of `Archived`)
    async fn current_event(&self) -> StoreResult<Option<Event>>;

    /// Find an event by ID
    async fn event(&self, id: EventId) -> StoreResult<Option<Event>>;

    /// Insert or update an event
    async fn save_event(&self, event: &Event) -> StoreResult<()>;

    /// Find a day by event and day number
    async fn day(&self, event_id: EventId, number: u32) -> StoreResult<Option<Day>>;

    /// Find the highest-numbered day of an event
    async fn last_day(&self, event_id: EventId) -> StoreResult<Option<Day>>;

    /// Create a day in `Pending` status, allocating its ID
    async fn create_day(&self, event_id: EventId, number: u32) -> StoreResult<Day>;

    /// Update a day
    async fn save_day(&self, day: &Day) -> StoreResult<()>;

    /// Find a room by day and room number
    async fn room(&self, day_id: DayId, number: u32) -> StoreResult<Option<Room>>;

    /// All rooms of a day, ordered by room number
    async fn rooms_for_day(&self, day_id: DayId) -> StoreResult<Vec<Room>>;

    /// Insert or update a room
    async fn save_room(&self, room: &Room) -> StoreResult<()>;

    /// Whether a table number is already used within a day
    async fn table_exists(&self, day_id: DayId, number: u32) -> StoreResult<bool>;

    /// All tables of a day, ordered by table number
    async fn tables_for_day(&self, day_id: DayId) -> StoreResult<Vec<Table>>;

    /// Tables of one room within a day, ordered by table number
    async fn tables_in_room(&self, day_id: DayId, room_number: u32) -> StoreResult<Vec<Table>>;

    /// Number of tables already built in one room of a day
    async fn count_tables_in_room(&self, day_id: DayId, room_number: u32) -> StoreResult<usize>;

    /// Insert or update a table
    async fn save_table(&self, table: &Table) -> StoreResult<()>;

    /// Find a ticket by ID
    async fn ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>>;

    /// Create a day-1 ticket with empty history, allocating its ID
    async fn create_ticket(
        &self,
        user_id: UserId,
        event_id: EventId,
        satellite_id: Option<SatelliteId>,
    ) -> StoreResult<Ticket>;

    /// Update a ticket
    async fn save_ticket(&self, ticket: &Ticket) -> StoreResult<()>;

    /// Tickets whose current day equals `day`, ordered by ticket ID
    async fn tickets_on_day(&self, event_id: EventId, day: u32) -> StoreResult<Vec<Ticket>>;

    /// Total tickets entered into an event
    async fn count_tickets(&self, event_id: EventId) -> StoreResult<u64>;

    /// Tickets whose current day is strictly greater than `day`
    async fn count_tickets_past_day(&self, event_id: EventId, day: u32) -> StoreResult<u64>;

    /// Create a satellite ticket, allocating its ID
    async fn create_satellite_ticket(
        &self,
        user_id: UserId,
        event_id: EventId,
        satellite_id: SatelliteId,
    ) -> StoreResult<SatelliteTicket>;

    /// Update a satellite ticket
    async fn save_satellite_ticket(&self, ticket: &SatelliteTicket) -> StoreResult<()>;

    /// All tickets of one satellite round, ordered by ticket ID
    async fn satellite_tickets(
        &self,
        satellite_id: SatelliteId,
    ) -> StoreResult<Vec<SatelliteTicket>>;

    /// Find a participant's winner ledger entry for an event
    async fn winner(&self, event_id: EventId, user_id: UserId) -> StoreResult<Option<Winner>>;

    /// Insert or update a winner ledger entry
    async fn save_winner(&self, winner: &Winner) -> StoreResult<()>;

    /// All winner ledger entries for an event
    async fn winners_for_event(&self, event_id: EventId) -> StoreResult<Vec<Winner>>;
}

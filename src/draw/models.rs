//! Data models for the elimination raffle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event ID type
pub type EventId = Uuid;

/// Satellite round ID type
pub type SatelliteId = Uuid;

/// Participant ID type
pub type UserId = i64;

/// Ticket ID type
pub type TicketId = i64;

/// Day ID type
pub type DayId = i64;

/// Seats per table
pub const TABLE_CAPACITY: usize = 10;

/// Maximum seats one participant may hold at a single table
pub const SEATS_PER_USER_CAP: usize = 2;

/// Tables per room; a table number encodes its room as `room * TABLES_PER_ROOM + offset`
pub const TABLES_PER_ROOM: u32 = 2000;

/// Tickets one room can hold
pub const ROOM_CAPACITY: usize = TABLES_PER_ROOM as usize * TABLE_CAPACITY;

/// Contenders left on each table after an elimination round
pub const SURVIVORS_PER_TABLE: usize = 3;

/// Event lifecycle; advances monotonically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    /// Created, main draw not yet packed
    Draft,
    /// Tournament in progress
    Active,
    /// Final winners selected
    Completed,
    /// Superseded by a newer event
    Archived,
}

/// Day lifecycle; advances monotonically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayStatus {
    /// Created, no rooms drawn into it yet
    Pending,
    /// Holding the live ticket pool
    Active,
    /// All rooms drawn, pool advanced to the next day
    Ended,
}

/// Main-round pricing and schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainRound {
    pub price: i64,
    pub date: DateTime<Utc>,
}

/// A qualifying sub-event whose winners are promoted into main-round tickets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteRound {
    pub id: SatelliteId,
    pub price: i64,
    pub date: DateTime<Utc>,
    /// Advertised entry cap
    pub entries: u32,
    /// Promotion quota: how many tickets this satellite feeds into day 1
    pub winners: u32,
    /// Cleared once the satellite has been consumed
    pub open: bool,
}

impl SatelliteRound {
    pub fn new(price: i64, date: DateTime<Utc>, entries: u32, winners: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            price,
            date,
            entries,
            winners,
            open: true,
        }
    }
}

/// One tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub status: EventStatus,
    pub main: Option<MainRound>,
    pub satellites: Vec<SatelliteRound>,
    /// Total tickets entered, recorded at completion/archival
    pub entry: u64,
    /// Final winner count, recorded at completion
    pub winner: u64,
}

impl Event {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            status: EventStatus::Draft,
            main: None,
            satellites: Vec::new(),
            entry: 0,
            winner: 0,
        }
    }

    /// Find a satellite round by ID
    pub fn satellite(&self, id: SatelliteId) -> Option<&SatelliteRound> {
        self.satellites.iter().find(|s| s.id == id)
    }

    pub fn satellite_mut(&mut self, id: SatelliteId) -> Option<&mut SatelliteRound> {
        self.satellites.iter_mut().find(|s| s.id == id)
    }
}

/// One elimination round within an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub id: DayId,
    pub event_id: EventId,
    /// 1-based, strictly increasing per event
    pub number: u32,
    pub status: DayStatus,
    /// Tickets entering this day
    pub entry: u64,
    /// Tickets that survived this day
    pub winner: u64,
}

/// A shard of up to [`TABLES_PER_ROOM`] tables within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub day_id: DayId,
    pub number: u32,
    /// Set once the room's elimination round has run
    pub drawn: bool,
}

/// A fixed-capacity seat list within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub day_id: DayId,
    /// Absolute table number: `room * TABLES_PER_ROOM + offset`
    pub number: u32,
    pub seats: Vec<TicketId>,
}

impl Table {
    /// Room this table belongs to, derived from the table number
    pub fn room_number(&self) -> u32 {
        self.number / TABLES_PER_ROOM
    }

    /// Offset within the owning room
    pub fn offset(&self) -> u32 {
        self.number % TABLES_PER_ROOM
    }
}

/// One {room, table offset, seat} assignment in a ticket's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seating {
    pub room: u32,
    pub table: u32,
    pub seat: u32,
}

/// One main-round entry for a participant.
///
/// `day` is the round the ticket currently sits on: survivors carry the next
/// day's number, eliminated tickets stay frozen at the round that cut them.
/// `history` gains one entry per day the ticket was packed into, so
/// `history.len() == d` means "already seated for day d".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    pub event_id: EventId,
    /// Satellite that promoted this ticket, if any
    pub satellite_id: Option<SatelliteId>,
    pub day: u32,
    pub history: Vec<Seating>,
}

impl Ticket {
    /// Whether this ticket already holds a seat for the given day
    pub fn packed_for(&self, day: u32) -> bool {
        self.history.len() as u32 >= day
    }
}

/// One entry in a satellite sub-event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteTicket {
    pub id: TicketId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub satellite_id: SatelliteId,
    /// Set once the ticket won promotion into the main round
    pub promoted: bool,
}

/// Permanent per-participant record of final-round wins for an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: UserId,
    pub event_id: EventId,
    /// Winning ticket ordinals, 1-based, appended on every win
    pub tickets: Vec<u32>,
}

/// Expected control outcomes of the operator-facing operations.
///
/// `AlreadyDrawn` and `RoomFilled` are results, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Ok,
    /// The targeted room has already run its elimination round
    AlreadyDrawn,
    /// The targeted room has no table capacity left
    RoomFilled,
}

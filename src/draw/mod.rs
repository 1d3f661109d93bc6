//! Core raffle entities and error types.

pub mod errors;
pub mod models;

pub use errors::{DrawError, DrawResult};
pub use models::{
    Day, DayId, DayStatus, DrawOutcome, Event, EventId, EventStatus, MainRound, Room,
    ROOM_CAPACITY, SEATS_PER_USER_CAP, SURVIVORS_PER_TABLE, SatelliteId, SatelliteRound,
    SatelliteTicket, Seating, TABLE_CAPACITY, TABLES_PER_ROOM, Table, Ticket, TicketId, UserId,
    Winner,
};

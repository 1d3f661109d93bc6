//! # Knockout Raffle
//!
//! A multi-round elimination raffle engine. Participants hold tickets,
//! tickets are packed into fixed-capacity tables, tables are sharded into
//! rooms, and operator-triggered elimination rounds thin the pool day by day
//! until a final selection picks the overall winners.
//!
//! ## Architecture
//!
//! The engine drives five operator-facing operations over a persisted ticket
//! pool:
//!
//! - **Satellite promotion**: winners of a qualifying sub-event become
//!   main-round tickets, seated straight into a day-1 room
//! - **Bootstrap**: the entire eligible pool is packed into day 1
//! - **Room draw**: one room's tables each shed contenders down to 3
//!   survivors, who are re-packed into the next day
//! - **End day**: a day closes and its successor activates
//! - **Final selection**: the last day's tables yield a bounded set of
//!   winners and the permanent winner ledger is written
//!
//! Packing respects a hard cap of 2 seats per participant per table, never
//! drops a ticket, and is resumable: table numbers already used by a day are
//! skipped and seated tickets are never seated twice.
//!
//! ## Core Modules
//!
//! - [`draw`]: entities (events, days, rooms, tables, tickets) and errors
//! - [`packing`]: the seat packer and room allocator
//! - [`engine`]: day coordination, elimination rounds and final selection
//! - [`store`]: persistence trait with in-memory and PostgreSQL backends
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use knockout_raffle::{DrawEngine, MemoryStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DrawEngine::new(Arc::new(MemoryStore::new()));
//! let event = engine.create_event("Spring Raffle".to_string()).await?;
//!
//! for user in 0..50 {
//!     engine.store().create_ticket(user, event.id, None).await?;
//! }
//! engine.bootstrap_main_draw().await?;
//! engine.draw_room(1, 0).await?;
//! # Ok(())
//! # }
//! ```

/// Core raffle entities and error types.
pub mod draw;
pub use draw::{
    DrawError, DrawOutcome, DrawResult, Event, EventStatus, SEATS_PER_USER_CAP,
    SURVIVORS_PER_TABLE, TABLE_CAPACITY, TABLES_PER_ROOM, Ticket, Winner,
};

/// Day coordination, elimination rounds and final selection.
pub mod engine;
pub use engine::DrawEngine;

/// Seat packing and room allocation.
pub mod packing;

/// Persistence backends.
pub mod store;
pub use store::{MemoryStore, PgStore, Store};

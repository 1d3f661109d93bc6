//! Seat packing: partitioning a ticket pool into capacity-10 tables under the
//! per-participant seat cap, and sharding the pool into rooms.
//!
//! Packing works on an owned, in-memory working copy of the tickets with
//! index-tracked removal; the persisted collections are never mutated while
//! being iterated. A stall counter bounds every table-fill loop: once every
//! remaining ticket has been skipped for the current table, the table closes
//! short instead of looping forever.

use std::collections::BTreeSet;

use crate::draw::errors::{DrawError, DrawResult};
use crate::draw::models::{
    Day, ROOM_CAPACITY, Room, SEATS_PER_USER_CAP, Seating, TABLE_CAPACITY, TABLES_PER_ROOM, Table,
    Ticket,
};
use crate::store::Store;

/// Result of one packing pass
#[derive(Debug, Default)]
pub struct PackReport {
    /// Tickets placed
    pub placed: usize,
    /// Tables persisted
    pub tables: usize,
    /// Room numbers that gained at least one table
    pub rooms: BTreeSet<u32>,
}

impl PackReport {
    fn merge(&mut self, other: PackReport) {
        self.placed += other.placed;
        self.tables += other.tables;
        self.rooms.extend(other.rooms);
    }
}

/// Pack a working set of tickets into tables of a day, walking table numbers
/// upward from `base_table` and skipping numbers the day already uses.
///
/// Every input ticket is placed exactly once; no table ends up with more than
/// [`SEATS_PER_USER_CAP`] seats for one participant. A table closes when it is
/// full, when the working set is exhausted, or when the stall counter exceeds
/// the remaining working set size (every leftover ticket is capped out for
/// this table).
pub async fn pack_shard(
    store: &dyn Store,
    day: &Day,
    mut pending: Vec<Ticket>,
    base_table: u32,
) -> DrawResult<PackReport> {
    let input_size = pending.len();
    let mut report = PackReport::default();
    let mut table_no = base_table;

    while !pending.is_empty() {
        // Resumable: table numbers already used by this day are never reissued.
        if store.table_exists(day.id, table_no).await? {
            table_no += 1;
            continue;
        }

        let mut seats = Vec::with_capacity(TABLE_CAPACITY);
        let mut seated_users = Vec::with_capacity(TABLE_CAPACITY);
        let mut stalls = 0usize;
        let mut idx = 0usize;

        while !pending.is_empty() {
            if idx >= pending.len() {
                idx = 0;
            }

            let user_id = pending[idx].user_id;
            let seats_held = seated_users.iter().filter(|&&u| u == user_id).count();
            if seats_held < SEATS_PER_USER_CAP {
                let mut ticket = pending.swap_remove(idx);
                ticket.history.push(Seating {
                    room: table_no / TABLES_PER_ROOM,
                    table: table_no % TABLES_PER_ROOM,
                    seat: seats.len() as u32,
                });
                ticket.day = day.number;
                store.save_ticket(&ticket).await?;
                seats.push(ticket.id);
                seated_users.push(user_id);
                stalls = 0;
            } else {
                stalls += 1;
                idx += 1;
            }

            if seats.len() == TABLE_CAPACITY || stalls > pending.len() {
                break;
            }
        }

        if !seats.is_empty() {
            log::debug!(
                "day {} table {}: {} seats ({} tickets left)",
                day.number,
                table_no,
                seats.len(),
                pending.len()
            );
            report.placed += seats.len();
            report.tables += 1;
            report.rooms.insert(table_no / TABLES_PER_ROOM);
            store
                .save_table(&Table {
                    day_id: day.id,
                    number: table_no,
                    seats,
                })
                .await?;
        }
        table_no += 1;
    }

    if report.placed != input_size {
        log::error!(
            "packing lost tickets: placed {} of {}",
            report.placed,
            input_size
        );
        return Err(DrawError::InvariantViolation(format!(
            "packing placed {} of {} tickets",
            report.placed, input_size
        )));
    }

    Ok(report)
}

/// Shard a ticket pool into rooms and pack each shard.
///
/// A room record is created for every shard index the pool needs, plus any
/// room the packer walks into when short tables push a shard past its base
/// range. Rooms the day already has are left as they are.
pub async fn pack_day(store: &dyn Store, day: &Day, tickets: Vec<Ticket>) -> DrawResult<usize> {
    if tickets.is_empty() {
        return Ok(0);
    }

    let shard_count = tickets.len().div_ceil(ROOM_CAPACITY);
    let mut report = PackReport::default();
    report.rooms.extend(0..shard_count as u32);

    let mut tickets = tickets;
    for shard in (0..shard_count).rev() {
        let chunk = tickets.split_off(shard * ROOM_CAPACITY);
        let shard_report =
            pack_shard(store, day, chunk, shard as u32 * TABLES_PER_ROOM).await?;
        report.merge(shard_report);
    }

    for &room_number in &report.rooms {
        ensure_room(store, day, room_number).await?;
    }

    log::info!(
        "packed day {}: {} tickets over {} tables in {} rooms",
        day.number,
        report.placed,
        report.tables,
        report.rooms.len()
    );
    Ok(report.placed)
}

/// Create a room record if the day does not have one yet
pub async fn ensure_room(store: &dyn Store, day: &Day, room_number: u32) -> DrawResult<Room> {
    if let Some(room) = store.room(day.id, room_number).await? {
        return Ok(room);
    }
    let room = Room {
        day_id: day.id,
        number: room_number,
        drawn: false,
    };
    store.save_room(&room).await?;
    Ok(room)
}

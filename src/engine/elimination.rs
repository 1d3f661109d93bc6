//! Per-table elimination and final winner selection.
//!
//! Both algorithms work on an owned contender list per table and remove
//! contenders by index, never mutating a persisted seat list while walking it.

use rand::Rng;

use crate::draw::errors::{DrawError, DrawResult};
use crate::draw::models::{Day, SURVIVORS_PER_TABLE, Table, Ticket};
use crate::store::Store;

/// Run the elimination round for one room of a day.
///
/// Each table is processed independently: seats still flagged with the
/// current day number are the contenders (re-validation guards a table
/// against double-processing), all contenders advance to the next day, then
/// random picks knock them back down until [`SURVIVORS_PER_TABLE`] remain.
/// Tables starting at or below the survivor count keep all contenders.
///
/// The caller is responsible for checking the room's `drawn` flag first.
pub async fn run_room_elimination<R: Rng>(
    store: &dyn Store,
    rng: &mut R,
    day: &Day,
    room_number: u32,
) -> DrawResult<()> {
    let tables = store.tables_in_room(day.id, room_number).await?;
    for table in tables.iter().rev() {
        eliminate_table(store, rng, day, table).await?;
    }
    log::info!(
        "day {} room {}: eliminated down to {} per table across {} tables",
        day.number,
        room_number,
        SURVIVORS_PER_TABLE,
        tables.len()
    );
    Ok(())
}

async fn eliminate_table<R: Rng>(
    store: &dyn Store,
    rng: &mut R,
    day: &Day,
    table: &Table,
) -> DrawResult<()> {
    let mut contenders = Vec::with_capacity(table.seats.len());
    for &seat in &table.seats {
        if let Some(mut ticket) = store.ticket(seat).await?
            && ticket.day == day.number
        {
            ticket.day = day.number + 1;
            store.save_ticket(&ticket).await?;
            contenders.push(ticket);
        }
    }

    while contenders.len() > SURVIVORS_PER_TABLE {
        let idx = rng.random_range(0..contenders.len());
        let mut loser = contenders.remove(idx);
        loser.day = day.number;
        store.save_ticket(&loser).await?;
    }

    Ok(())
}

/// Select up to `target` final winners from the last day's tables.
///
/// Tables are walked in reverse order. Each table draws a random threshold in
/// `0..=2` and sheds uniformly random contenders down to it, advancing every
/// pick to "won" status (current day set past the last day). Selection stops
/// dead once the running total reaches `target`, even mid-table: the target
/// is a hard cap.
pub async fn select_final<R: Rng>(
    store: &dyn Store,
    rng: &mut R,
    day: &Day,
    target: usize,
) -> DrawResult<Vec<Ticket>> {
    let tables = store.tables_for_day(day.id).await?;
    let mut selected: Vec<Ticket> = Vec::with_capacity(target);

    'tables: for table in tables.iter().rev() {
        let mut contenders = Vec::with_capacity(table.seats.len());
        for &seat in &table.seats {
            if let Some(ticket) = store.ticket(seat).await?
                && ticket.day == day.number
            {
                contenders.push(ticket);
            }
        }

        let threshold = rng.random_range(0..=2usize);
        while contenders.len() > threshold {
            if selected.len() >= target {
                break 'tables;
            }
            let idx = rng.random_range(0..contenders.len());
            let mut winner = contenders.remove(idx);
            winner.day = day.number + 1;
            store.save_ticket(&winner).await?;
            selected.push(winner);
        }
    }

    if selected.len() > target {
        return Err(DrawError::InvariantViolation(format!(
            "final selection overshot target: {} > {}",
            selected.len(),
            target
        )));
    }

    log::info!(
        "final selection on day {}: {} of {} requested winners",
        day.number,
        selected.len(),
        target
    );
    Ok(selected)
}

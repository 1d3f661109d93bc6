//! Draw engine: the operator-facing coordinator over days, rooms and tickets.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::elimination::{run_room_elimination, select_final};
use crate::draw::errors::{DrawError, DrawResult};
use crate::draw::models::{
    Day, DayStatus, DrawOutcome, Event, EventId, EventStatus, MainRound, SatelliteId,
    SatelliteRound, TABLE_CAPACITY, TABLES_PER_ROOM, Ticket, Winner,
};
use crate::packing::{ensure_room, pack_day, pack_shard};
use crate::store::Store;
use chrono::{DateTime, Utc};

/// Coordinates packing, elimination and final selection over a [`Store`].
///
/// Every operation runs as one sequential unit of work under a per-event
/// mutex, so two operations touching the same day, room or ticket set cannot
/// interleave within a process.
pub struct DrawEngine {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
}

impl DrawEngine {
    /// Create a new draw engine over a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    async fn lock_event(&self, event_id: EventId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(event_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    async fn current_event(&self) -> DrawResult<Event> {
        self.store
            .current_event()
            .await?
            .ok_or(DrawError::EventNotFound)
    }

    async fn ensure_day(&self, event_id: EventId, number: u32) -> DrawResult<Day> {
        if let Some(day) = self.store.day(event_id, number).await? {
            return Ok(day);
        }
        let day = self.store.create_day(event_id, number).await?;
        log::info!("created day {number}");
        Ok(day)
    }

    /// Create a new draft event, archiving the one it supersedes.
    ///
    /// The superseded event gets its final entry count recorded before it is
    /// archived.
    pub async fn create_event(&self, name: String) -> DrawResult<Event> {
        if let Some(mut old) = self.store.current_event().await? {
            let _guard = self.lock_event(old.id).await;
            old.entry = self.store.count_tickets(old.id).await?;
            old.status = EventStatus::Archived;
            self.store.save_event(&old).await?;
            log::info!("archived event '{}'", old.name);
        }

        let event = Event::new(name);
        self.store.save_event(&event).await?;
        log::info!("created draft event '{}'", event.name);
        Ok(event)
    }

    /// Set the main round's price and date on the current event
    pub async fn set_main_round(&self, price: i64, date: DateTime<Utc>) -> DrawResult<Event> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;

        let mut event = self.refetch(event.id).await?;
        event.main = Some(MainRound { price, date });
        self.store.save_event(&event).await?;
        Ok(event)
    }

    /// Append a satellite round to the current event
    pub async fn add_satellite(
        &self,
        price: i64,
        date: DateTime<Utc>,
        entries: u32,
        winners: u32,
    ) -> DrawResult<SatelliteId> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;

        let mut event = self.refetch(event.id).await?;
        let satellite = SatelliteRound::new(price, date, entries, winners);
        let id = satellite.id;
        event.satellites.push(satellite);
        self.store.save_event(&event).await?;
        Ok(id)
    }

    /// Promote satellite winners into the main pool and pack them into one
    /// day-1 room.
    ///
    /// Returns `AlreadyDrawn` if the room has already run its elimination,
    /// `RoomFilled` if the room cannot hold the satellite's quota.
    pub async fn promote_satellite_winners(
        &self,
        satellite_id: SatelliteId,
        room_number: u32,
    ) -> DrawResult<DrawOutcome> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;
        let mut event = self.refetch(event.id).await?;

        let quota = event
            .satellite(satellite_id)
            .ok_or(DrawError::SatelliteNotFound(satellite_id))?
            .winners as usize;

        let mut day = self.ensure_day(event.id, 1).await?;

        if let Some(room) = self.store.room(day.id, room_number).await? {
            if room.drawn {
                return Ok(DrawOutcome::AlreadyDrawn);
            }
            let used = self.store.count_tables_in_room(day.id, room_number).await?;
            if used + quota.div_ceil(TABLE_CAPACITY) > TABLES_PER_ROOM as usize {
                return Ok(DrawOutcome::RoomFilled);
            }
        } else {
            ensure_room(self.store.as_ref(), &day, room_number).await?;
        }

        let mut pool: Vec<_> = self
            .store
            .satellite_tickets(satellite_id)
            .await?
            .into_iter()
            .filter(|t| !t.promoted)
            .collect();
        if pool.is_empty() {
            return Ok(DrawOutcome::Ok);
        }

        let mut rng = StdRng::from_os_rng();
        let mut promoted: Vec<Ticket> = Vec::with_capacity(quota.min(pool.len()));
        while promoted.len() < quota && !pool.is_empty() {
            let idx = rng.random_range(0..pool.len());
            let mut winner = pool.remove(idx);
            winner.promoted = true;
            self.store.save_satellite_ticket(&winner).await?;

            let ticket = self
                .store
                .create_ticket(winner.user_id, event.id, Some(satellite_id))
                .await?;
            promoted.push(ticket);
        }
        log::info!(
            "satellite {satellite_id}: promoted {} winners into room {room_number}",
            promoted.len()
        );

        let report = pack_shard(
            self.store.as_ref(),
            &day,
            promoted,
            room_number * TABLES_PER_ROOM,
        )
        .await?;
        // Short tables can push the pack past the room's number range.
        for &walked in &report.rooms {
            ensure_room(self.store.as_ref(), &day, walked).await?;
        }

        day.entry = self.store.count_tickets(event.id).await?;
        self.store.save_day(&day).await?;

        // A satellite is consumed exactly once.
        if let Some(satellite) = event.satellite_mut(satellite_id) {
            satellite.open = false;
        }
        self.store.save_event(&event).await?;

        Ok(DrawOutcome::Ok)
    }

    /// Create day 1 if absent and pack the entire eligible ticket pool into
    /// it. Promotes a draft event to active.
    pub async fn bootstrap_main_draw(&self) -> DrawResult<DrawOutcome> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;
        let mut event = self.refetch(event.id).await?;

        let mut day = self.ensure_day(event.id, 1).await?;

        // Tickets already seated by a satellite promotion keep their seats.
        let pool: Vec<Ticket> = self
            .store
            .tickets_on_day(event.id, 1)
            .await?
            .into_iter()
            .filter(|t| !t.packed_for(1))
            .collect();

        day.entry = self.store.count_tickets(event.id).await?;
        day.status = DayStatus::Active;
        self.store.save_day(&day).await?;

        pack_day(self.store.as_ref(), &day, pool).await?;

        if event.status == EventStatus::Draft {
            event.status = EventStatus::Active;
            self.store.save_event(&event).await?;
        }

        Ok(DrawOutcome::Ok)
    }

    /// Run the elimination round for one room and re-pack the survivors into
    /// the next day's tables.
    pub async fn draw_room(&self, day_number: u32, room_number: u32) -> DrawResult<DrawOutcome> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;

        let mut day = self
            .store
            .day(event.id, day_number)
            .await?
            .ok_or(DrawError::DayNotFound(day_number))?;
        let mut room = self
            .store
            .room(day.id, room_number)
            .await?
            .ok_or(DrawError::RoomNotFound {
                day: day_number,
                room: room_number,
            })?;
        if room.drawn {
            return Ok(DrawOutcome::AlreadyDrawn);
        }

        let mut next_day = self.ensure_day(event.id, day_number + 1).await?;

        let mut rng = StdRng::from_os_rng();
        run_room_elimination(self.store.as_ref(), &mut rng, &day, room_number).await?;

        // Survivors of earlier rooms are already seated for the next day;
        // only the newly advanced ones get packed.
        let survivors: Vec<Ticket> = self
            .store
            .tickets_on_day(event.id, day_number + 1)
            .await?
            .into_iter()
            .filter(|t| !t.packed_for(day_number + 1))
            .collect();
        pack_day(self.store.as_ref(), &next_day, survivors).await?;

        room.drawn = true;
        self.store.save_room(&room).await?;

        let advancing = self.store.count_tickets_past_day(event.id, day_number).await?;
        day.winner = advancing;
        self.store.save_day(&day).await?;
        next_day.entry = advancing;
        self.store.save_day(&next_day).await?;

        log::info!("drew day {day_number} room {room_number}: {advancing} tickets advancing");
        Ok(DrawOutcome::Ok)
    }

    /// Close a day and activate its successor, recomputing both days'
    /// counters from the ticket pool.
    pub async fn end_day(&self, day_number: u32) -> DrawResult<DrawOutcome> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;
        let mut event = self.refetch(event.id).await?;

        let mut day = self
            .store
            .day(event.id, day_number)
            .await?
            .ok_or(DrawError::DayNotFound(day_number))?;
        let mut next_day = self
            .store
            .day(event.id, day_number + 1)
            .await?
            .ok_or(DrawError::DayNotFound(day_number + 1))?;

        let advancing = self.store.count_tickets_past_day(event.id, day_number).await?;

        day.status = DayStatus::Ended;
        day.winner = advancing;
        self.store.save_day(&day).await?;

        next_day.status = DayStatus::Active;
        next_day.entry = advancing;
        self.store.save_day(&next_day).await?;

        if event.status == EventStatus::Draft {
            event.status = EventStatus::Active;
            self.store.save_event(&event).await?;
        }

        log::info!("ended day {day_number}: {advancing} tickets advance to day {}", day_number + 1);
        Ok(DrawOutcome::Ok)
    }

    /// Select the final winners from the last day, write the winner ledger
    /// and complete the event.
    pub async fn select_final_winners(&self, target: usize) -> DrawResult<DrawOutcome> {
        let event = self.current_event().await?;
        let _guard = self.lock_event(event.id).await;
        let mut event = self.refetch(event.id).await?;

        let mut day = self
            .store
            .last_day(event.id)
            .await?
            .ok_or(DrawError::DayNotFound(1))?;

        let mut rng = StdRng::from_os_rng();
        let selected = select_final(self.store.as_ref(), &mut rng, &day, target).await?;

        for mut room in self.store.rooms_for_day(day.id).await? {
            room.drawn = true;
            self.store.save_room(&room).await?;
        }

        day.status = DayStatus::Ended;
        day.winner = selected.len() as u64;
        self.store.save_day(&day).await?;

        // Winning ordinals are 1-based in selection order; a participant who
        // wins with several tickets accumulates ordinals in one ledger entry.
        for (ordinal, ticket) in selected.iter().enumerate() {
            let mut entry = self
                .store
                .winner(event.id, ticket.user_id)
                .await?
                .unwrap_or(Winner {
                    user_id: ticket.user_id,
                    event_id: event.id,
                    tickets: Vec::new(),
                });
            entry.tickets.push(ordinal as u32 + 1);
            self.store.save_winner(&entry).await?;
        }

        event.status = EventStatus::Completed;
        event.winner = selected.len() as u64;
        event.entry = self.store.count_tickets(event.id).await?;
        self.store.save_event(&event).await?;

        log::info!(
            "event '{}' completed: {} winners from {} entries",
            event.name,
            event.winner,
            event.entry
        );
        Ok(DrawOutcome::Ok)
    }

    async fn refetch(&self, event_id: EventId) -> DrawResult<Event> {
        self.store
            .event(event_id)
            .await?
            .ok_or(DrawError::EventNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn engine_with_event() -> (DrawEngine, Event) {
        let engine = DrawEngine::new(Arc::new(MemoryStore::new()));
        let event = engine.create_event("Test Raffle".to_string()).await.unwrap();
        (engine, event)
    }

    #[tokio::test]
    async fn test_create_event_archives_predecessor() {
        let (engine, first) = engine_with_event().await;
        let second = engine.create_event("Next".to_string()).await.unwrap();

        let old = engine.store().event(first.id).await.unwrap().unwrap();
        assert_eq!(old.status, EventStatus::Archived);

        let current = engine.store().current_event().await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
    }

    #[tokio::test]
    async fn test_bootstrap_packs_pool_and_activates_event() {
        let (engine, event) = engine_with_event().await;
        for user in 0..25 {
            engine
                .store()
                .create_ticket(user, event.id, None)
                .await
                .unwrap();
        }

        assert_eq!(
            engine.bootstrap_main_draw().await.unwrap(),
            DrawOutcome::Ok
        );

        let event = engine.store().event(event.id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Active);

        let day = engine.store().day(event.id, 1).await.unwrap().unwrap();
        assert_eq!(day.status, DayStatus::Active);
        assert_eq!(day.entry, 25);

        let tables = engine.store().tables_for_day(day.id).await.unwrap();
        assert_eq!(tables.iter().map(|t| t.seats.len()).sum::<usize>(), 25);
    }

    #[tokio::test]
    async fn test_bootstrap_is_retriggerable() {
        let (engine, event) = engine_with_event().await;
        for user in 0..12 {
            engine
                .store()
                .create_ticket(user, event.id, None)
                .await
                .unwrap();
        }

        engine.bootstrap_main_draw().await.unwrap();
        engine.bootstrap_main_draw().await.unwrap();

        let day = engine.store().day(event.id, 1).await.unwrap().unwrap();
        let tables = engine.store().tables_for_day(day.id).await.unwrap();
        // No ticket was packed twice.
        assert_eq!(tables.iter().map(|t| t.seats.len()).sum::<usize>(), 12);
    }

    #[tokio::test]
    async fn test_draw_room_advances_and_repacks_survivors() {
        let (engine, event) = engine_with_event().await;
        for user in 0..20 {
            engine
                .store()
                .create_ticket(user, event.id, None)
                .await
                .unwrap();
        }
        engine.bootstrap_main_draw().await.unwrap();

        assert_eq!(engine.draw_room(1, 0).await.unwrap(), DrawOutcome::Ok);

        // Two full tables of 10 leave 3 survivors each.
        let day1 = engine.store().day(event.id, 1).await.unwrap().unwrap();
        assert_eq!(day1.winner, 6);

        let day2 = engine.store().day(event.id, 2).await.unwrap().unwrap();
        assert_eq!(day2.entry, 6);
        let tables = engine.store().tables_for_day(day2.id).await.unwrap();
        assert_eq!(tables.iter().map(|t| t.seats.len()).sum::<usize>(), 6);

        // Re-drawing the same room is refused.
        assert_eq!(
            engine.draw_room(1, 0).await.unwrap(),
            DrawOutcome::AlreadyDrawn
        );
    }

    #[tokio::test]
    async fn test_draw_room_requires_existing_room() {
        let (engine, event) = engine_with_event().await;
        engine
            .store()
            .create_ticket(1, event.id, None)
            .await
            .unwrap();
        engine.bootstrap_main_draw().await.unwrap();

        let err = engine.draw_room(1, 5).await.unwrap_err();
        assert!(matches!(
            err,
            DrawError::RoomNotFound { day: 1, room: 5 }
        ));
        let err = engine.draw_room(9, 0).await.unwrap_err();
        assert!(matches!(err, DrawError::DayNotFound(9)));
    }

    #[tokio::test]
    async fn test_end_day_requires_successor() {
        let (engine, event) = engine_with_event().await;
        engine
            .store()
            .create_ticket(1, event.id, None)
            .await
            .unwrap();
        engine.bootstrap_main_draw().await.unwrap();

        let err = engine.end_day(1).await.unwrap_err();
        assert!(matches!(err, DrawError::DayNotFound(2)));
    }

    #[tokio::test]
    async fn test_end_day_flips_statuses_and_counters() {
        let (engine, event) = engine_with_event().await;
        for user in 0..20 {
            engine
                .store()
                .create_ticket(user, event.id, None)
                .await
                .unwrap();
        }
        engine.bootstrap_main_draw().await.unwrap();
        engine.draw_room(1, 0).await.unwrap();

        assert_eq!(engine.end_day(1).await.unwrap(), DrawOutcome::Ok);

        let day1 = engine.store().day(event.id, 1).await.unwrap().unwrap();
        let day2 = engine.store().day(event.id, 2).await.unwrap().unwrap();
        assert_eq!(day1.status, DayStatus::Ended);
        assert_eq!(day2.status, DayStatus::Active);
        assert_eq!(day1.winner, day2.entry);
    }

    #[tokio::test]
    async fn test_satellite_promotion_respects_quota() {
        let (engine, event) = engine_with_event().await;
        let satellite_id = engine
            .add_satellite(25, Utc::now(), 100, 4)
            .await
            .unwrap();
        for user in 0..10 {
            engine
                .store()
                .create_satellite_ticket(user, event.id, satellite_id)
                .await
                .unwrap();
        }

        assert_eq!(
            engine
                .promote_satellite_winners(satellite_id, 0)
                .await
                .unwrap(),
            DrawOutcome::Ok
        );

        assert_eq!(engine.store().count_tickets(event.id).await.unwrap(), 4);
        let promoted = engine
            .store()
            .satellite_tickets(satellite_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.promoted)
            .count();
        assert_eq!(promoted, 4);

        // Satellite consumed.
        let event = engine.store().event(event.id).await.unwrap().unwrap();
        assert!(!event.satellite(satellite_id).unwrap().open);
    }

    #[tokio::test]
    async fn test_satellite_promotion_on_drawn_room_mutates_nothing() {
        let (engine, event) = engine_with_event().await;
        let satellite_id = engine
            .add_satellite(25, Utc::now(), 100, 3)
            .await
            .unwrap();
        for user in 0..6 {
            engine
                .store()
                .create_satellite_ticket(user, event.id, satellite_id)
                .await
                .unwrap();
        }

        engine
            .promote_satellite_winners(satellite_id, 0)
            .await
            .unwrap();

        let day = engine.store().day(event.id, 1).await.unwrap().unwrap();
        let mut room = engine.store().room(day.id, 0).await.unwrap().unwrap();
        room.drawn = true;
        engine.store().save_room(&room).await.unwrap();

        let before = engine.store().count_tickets(event.id).await.unwrap();
        assert_eq!(
            engine
                .promote_satellite_winners(satellite_id, 0)
                .await
                .unwrap(),
            DrawOutcome::AlreadyDrawn
        );
        assert_eq!(engine.store().count_tickets(event.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_satellite_promotion_reports_filled_room() {
        let (engine, event) = engine_with_event().await;
        // Quota so large the room can never hold it.
        let satellite_id = engine
            .add_satellite(25, Utc::now(), 100, TABLES_PER_ROOM * 10 + 1)
            .await
            .unwrap();
        engine
            .store()
            .create_satellite_ticket(1, event.id, satellite_id)
            .await
            .unwrap();

        // First call creates the room; a pre-existing room triggers the
        // capacity check.
        let day = engine.ensure_day(event.id, 1).await.unwrap();
        ensure_room(engine.store(), &day, 0).await.unwrap();

        assert_eq!(
            engine
                .promote_satellite_winners(satellite_id, 0)
                .await
                .unwrap(),
            DrawOutcome::RoomFilled
        );
    }

    #[tokio::test]
    async fn test_unknown_satellite_is_an_error() {
        let (engine, _event) = engine_with_event().await;
        let err = engine
            .promote_satellite_winners(uuid::Uuid::new_v4(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DrawError::SatelliteNotFound(_)));
    }

    #[tokio::test]
    async fn test_final_selection_completes_event_and_writes_ledger() {
        let (engine, event) = engine_with_event().await;
        for user in 0..20 {
            engine
                .store()
                .create_ticket(user, event.id, None)
                .await
                .unwrap();
        }
        engine.bootstrap_main_draw().await.unwrap();
        engine.draw_room(1, 0).await.unwrap();
        engine.end_day(1).await.unwrap();

        assert_eq!(
            engine.select_final_winners(4).await.unwrap(),
            DrawOutcome::Ok
        );

        let event = engine.store().event(event.id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Completed);
        assert_eq!(event.winner, 4);
        assert_eq!(event.entry, 20);

        let ledger = engine.store().winners_for_event(event.id).await.unwrap();
        let ordinals: usize = ledger.iter().map(|w| w.tickets.len()).sum();
        assert_eq!(ordinals, 4);

        let last = engine.store().last_day(event.id).await.unwrap().unwrap();
        assert_eq!(last.status, DayStatus::Ended);
        for room in engine.store().rooms_for_day(last.id).await.unwrap() {
            assert!(room.drawn);
        }
    }

    #[tokio::test]
    async fn test_winner_ledger_appends_on_repeat_wins() {
        let (engine, event) = engine_with_event().await;
        let first = Winner {
            user_id: 9,
            event_id: event.id,
            tickets: vec![1],
        };
        engine.store().save_winner(&first).await.unwrap();

        let mut entry = engine
            .store()
            .winner(event.id, 9)
            .await
            .unwrap()
            .unwrap();
        entry.tickets.push(3);
        engine.store().save_winner(&entry).await.unwrap();

        let after = engine
            .store()
            .winner(event.id, 9)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.tickets, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_operations_without_event_fail() {
        let engine = DrawEngine::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            engine.bootstrap_main_draw().await.unwrap_err(),
            DrawError::EventNotFound
        ));
        assert!(matches!(
            engine.select_final_winners(5).await.unwrap_err(),
            DrawError::EventNotFound
        ));
    }
}

//! Integration tests for the full raffle lifecycle.
//!
//! These drive the engine over the in-memory store from event creation
//! through satellite promotion, day-by-day elimination and final selection,
//! checking the pool invariants after every phase.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use knockout_raffle::draw::models::{DayStatus, EventId, SEATS_PER_USER_CAP};
use knockout_raffle::{DrawEngine, DrawOutcome, EventStatus, MemoryStore, Store};

async fn assert_day_invariants(store: &MemoryStore, event_id: EventId, day_number: u32) {
    let day = store.day(event_id, day_number).await.unwrap().unwrap();
    let tables = store.tables_for_day(day.id).await.unwrap();

    let mut seen = std::collections::HashSet::new();
    let mut seated = 0usize;
    for table in &tables {
        assert!(table.seats.len() <= 10, "table over capacity");

        let mut per_user: HashMap<i64, usize> = HashMap::new();
        for &seat in &table.seats {
            assert!(seen.insert(seat), "ticket {seat} seated twice on one day");
            let ticket = store.ticket(seat).await.unwrap().unwrap();
            *per_user.entry(ticket.user_id).or_default() += 1;
        }
        assert!(
            per_user.values().all(|&c| c <= SEATS_PER_USER_CAP),
            "participant over seat cap at table {}",
            table.number
        );
        seated += table.seats.len();

        // Rooms exist for exactly the room numbers tables use.
        let room = store
            .room(day.id, table.room_number())
            .await
            .unwrap();
        assert!(room.is_some(), "room {} missing", table.room_number());
    }

    // Before elimination, every ticket sitting on this day holds a seat.
    let on_day = store.tickets_on_day(event_id, day_number).await.unwrap();
    let packed = on_day
        .iter()
        .filter(|t| t.packed_for(day_number))
        .count();
    assert_eq!(packed, on_day.len(), "unpacked ticket on day {day_number}");
    assert!(seated >= on_day.len());
}

#[tokio::test]
async fn test_full_tournament_lifecycle() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = DrawEngine::new(store.clone());

    let event = engine.create_event("Grand Draw".to_string()).await?;
    engine.set_main_round(100, Utc::now()).await?;
    let satellite_id = engine.add_satellite(10, Utc::now(), 60, 15).await?;

    // 30 satellite entries across 15 participants, 15 get promoted.
    for user in 0..15 {
        store
            .create_satellite_ticket(user, event.id, satellite_id)
            .await?;
        store
            .create_satellite_ticket(user, event.id, satellite_id)
            .await?;
    }
    assert_eq!(
        engine.promote_satellite_winners(satellite_id, 0).await?,
        DrawOutcome::Ok
    );
    assert_eq!(store.count_tickets(event.id).await?, 15);

    // Direct purchases top the pool up to 60.
    for user in 100..145 {
        store.create_ticket(user, event.id, None).await?;
    }

    assert_eq!(engine.bootstrap_main_draw().await?, DrawOutcome::Ok);
    let event_after = store.event(event.id).await?.unwrap();
    assert_eq!(event_after.status, EventStatus::Active);
    assert_day_invariants(&store, event.id, 1).await;

    let day1 = store.day(event.id, 1).await?.unwrap();
    assert_eq!(day1.entry, 60);

    // Draw every room of day 1 (60 tickets fit in room 0).
    for room in store.rooms_for_day(day1.id).await? {
        assert_eq!(engine.draw_room(1, room.number).await?, DrawOutcome::Ok);
    }
    assert_day_invariants(&store, event.id, 2).await;

    // 7 tables (the satellite pack leaves a short one) keep 3 each.
    let day1 = store.day(event.id, 1).await?.unwrap();
    assert_eq!(day1.winner, 21);

    engine.end_day(1).await?;
    let day2 = store.day(event.id, 2).await?.unwrap();
    assert_eq!(day2.status, DayStatus::Active);
    assert_eq!(day2.entry, 21);

    // Day 2: 21 survivors over 3 tables; draw and close it.
    let day2_rooms = store.rooms_for_day(day2.id).await?;
    for room in day2_rooms {
        engine.draw_room(2, room.number).await?;
    }
    engine.end_day(2).await?;
    assert_day_invariants(&store, event.id, 3).await;

    // Terminate with 4 winners.
    assert_eq!(engine.select_final_winners(4).await?, DrawOutcome::Ok);

    let finished = store.event(event.id).await?.unwrap();
    assert_eq!(finished.status, EventStatus::Completed);
    assert_eq!(finished.winner, 4);
    assert_eq!(finished.entry, 60);

    let ledger = store.winners_for_event(event.id).await?;
    let mut ordinals: Vec<u32> = ledger.iter().flat_map(|w| w.tickets.clone()).collect();
    ordinals.sort_unstable();
    assert_eq!(ordinals, vec![1, 2, 3, 4]);

    Ok(())
}

#[tokio::test]
async fn test_double_draw_is_rejected_and_harmless() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = DrawEngine::new(store.clone());
    let event = engine.create_event("Replay".to_string()).await?;

    for user in 0..10 {
        store.create_ticket(user, event.id, None).await?;
    }
    engine.bootstrap_main_draw().await?;
    engine.draw_room(1, 0).await?;

    let survivors_before = store.count_tickets_past_day(event.id, 1).await?;
    assert_eq!(
        engine.draw_room(1, 0).await?,
        DrawOutcome::AlreadyDrawn
    );
    assert_eq!(
        store.count_tickets_past_day(event.id, 1).await?,
        survivors_before
    );
    Ok(())
}

#[tokio::test]
async fn test_satellite_and_direct_entries_share_day_one_tables() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = DrawEngine::new(store.clone());
    let event = engine.create_event("Mixed Pool".to_string()).await?;
    let satellite_id = engine.add_satellite(10, Utc::now(), 20, 5).await?;

    for user in 0..8 {
        store
            .create_satellite_ticket(user, event.id, satellite_id)
            .await?;
    }
    engine.promote_satellite_winners(satellite_id, 0).await?;

    for user in 50..57 {
        store.create_ticket(user, event.id, None).await?;
    }
    engine.bootstrap_main_draw().await?;

    // 5 promoted + 7 direct = 12 seats, with the satellite table untouched.
    let day1 = store.day(event.id, 1).await?.unwrap();
    let tables = store.tables_for_day(day1.id).await?;
    let seated: usize = tables.iter().map(|t| t.seats.len()).sum();
    assert_eq!(seated, 12);
    assert_day_invariants(&store, event.id, 1).await;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_draws_cannot_double_process() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(DrawEngine::new(store.clone()));
    let event = engine.create_event("Race".to_string()).await?;

    for user in 0..10 {
        store.create_ticket(user, event.id, None).await?;
    }
    engine.bootstrap_main_draw().await?;

    let (a, b) = tokio::join!(
        {
            let engine = engine.clone();
            async move { engine.draw_room(1, 0).await }
        },
        {
            let engine = engine.clone();
            async move { engine.draw_room(1, 0).await }
        }
    );

    let outcomes = [a?, b?];
    assert!(outcomes.contains(&DrawOutcome::Ok));
    assert!(outcomes.contains(&DrawOutcome::AlreadyDrawn));
    assert_eq!(store.count_tickets_past_day(event.id, 1).await?, 3);
    Ok(())
}

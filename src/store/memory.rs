//! In-memory store used by the test suite and embedded deployments.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreResult};
use crate::draw::models::{
    Day, DayId, DayStatus, Event, EventId, Room, SatelliteId, SatelliteTicket, Table, Ticket,
    TicketId, UserId, Winner,
};
use crate::draw::models::{EventStatus, TABLES_PER_ROOM};

/// In-memory [`Store`] implementation backed by `tokio::sync::RwLock`ed
/// ordered maps. Ordered keys give packing passes the same stable iteration
/// order the SQL implementation gets from `ORDER BY`.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<BTreeMap<EventId, Event>>,
    days: RwLock<BTreeMap<DayId, Day>>,
    rooms: RwLock<BTreeMap<(DayId, u32), Room>>,
    tables: RwLock<BTreeMap<(DayId, u32), Table>>,
    tickets: RwLock<BTreeMap<TicketId, Ticket>>,
    satellite_tickets: RwLock<BTreeMap<TicketId, SatelliteTicket>>,
    winners: RwLock<BTreeMap<(EventId, UserId), Winner>>,
    next_ticket_id: AtomicI64,
    next_day_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_ticket_id: AtomicI64::new(1),
            next_day_id: AtomicI64::new(1),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn current_event(&self) -> StoreResult<Option<Event>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .find(|e| e.status != EventStatus::Archived)
            .cloned())
    }

    async fn event(&self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn save_event(&self, event: &Event) -> StoreResult<()> {
        self.events.write().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn day(&self, event_id: EventId, number: u32) -> StoreResult<Option<Day>> {
        let days = self.days.read().await;
        Ok(days
            .values()
            .find(|d| d.event_id == event_id && d.number == number)
            .cloned())
    }

    async fn last_day(&self, event_id: EventId) -> StoreResult<Option<Day>> {
        let days = self.days.read().await;
        Ok(days
            .values()
            .filter(|d| d.event_id == event_id)
            .max_by_key(|d| d.number)
            .cloned())
    }

    async fn create_day(&self, event_id: EventId, number: u32) -> StoreResult<Day> {
        let day = Day {
            id: self.next_day_id.fetch_add(1, Ordering::SeqCst),
            event_id,
            number,
            status: DayStatus::Pending,
            entry: 0,
            winner: 0,
        };
        self.days.write().await.insert(day.id, day.clone());
        Ok(day)
    }

    async fn save_day(&self, day: &Day) -> StoreResult<()> {
        self.days.write().await.insert(day.id, day.clone());
        Ok(())
    }

    async fn room(&self, day_id: DayId, number: u32) -> StoreResult<Option<Room>> {
        Ok(self.rooms.read().await.get(&(day_id, number)).cloned())
    }

    async fn rooms_for_day(&self, day_id: DayId) -> StoreResult<Vec<Room>> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .range((day_id, 0)..(day_id, u32::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn save_room(&self, room: &Room) -> StoreResult<()> {
        self.rooms
            .write()
            .await
            .insert((room.day_id, room.number), room.clone());
        Ok(())
    }

    async fn table_exists(&self, day_id: DayId, number: u32) -> StoreResult<bool> {
        Ok(self.tables.read().await.contains_key(&(day_id, number)))
    }

    async fn tables_for_day(&self, day_id: DayId) -> StoreResult<Vec<Table>> {
        let tables = self.tables.read().await;
        Ok(tables
            .range((day_id, 0)..(day_id, u32::MAX))
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn tables_in_room(&self, day_id: DayId, room_number: u32) -> StoreResult<Vec<Table>> {
        let lo = room_number * TABLES_PER_ROOM;
        let hi = (room_number + 1) * TABLES_PER_ROOM;
        let tables = self.tables.read().await;
        Ok(tables
            .range((day_id, lo)..(day_id, hi))
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn count_tables_in_room(&self, day_id: DayId, room_number: u32) -> StoreResult<usize> {
        let lo = room_number * TABLES_PER_ROOM;
        let hi = (room_number + 1) * TABLES_PER_ROOM;
        let tables = self.tables.read().await;
        Ok(tables.range((day_id, lo)..(day_id, hi)).count())
    }

    async fn save_table(&self, table: &Table) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .insert((table.day_id, table.number), table.clone());
        Ok(())
    }

    async fn ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn create_ticket(
        &self,
        user_id: UserId,
        event_id: EventId,
        satellite_id: Option<SatelliteId>,
    ) -> StoreResult<Ticket> {
        let ticket = Ticket {
            id: self.next_ticket_id.fetch_add(1, Ordering::SeqCst),
            user_id,
            event_id,
            satellite_id,
            day: 1,
            history: Vec::new(),
        };
        self.tickets.write().await.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn save_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        self.tickets.write().await.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn tickets_on_day(&self, event_id: EventId, day: u32) -> StoreResult<Vec<Ticket>> {
        let tickets = self.tickets.read().await;
        Ok(tickets
            .values()
            .filter(|t| t.event_id == event_id && t.day == day)
            .cloned()
            .collect())
    }

    async fn count_tickets(&self, event_id: EventId) -> StoreResult<u64> {
        let tickets = self.tickets.read().await;
        Ok(tickets.values().filter(|t| t.event_id == event_id).count() as u64)
    }

    async fn count_tickets_past_day(&self, event_id: EventId, day: u32) -> StoreResult<u64> {
        let tickets = self.tickets.read().await;
        Ok(tickets
            .values()
            .filter(|t| t.event_id == event_id && t.day > day)
            .count() as u64)
    }

    async fn create_satellite_ticket(
        &self,
        user_id: UserId,
        event_id: EventId,
        satellite_id: SatelliteId,
    ) -> StoreResult<SatelliteTicket> {
        let ticket = SatelliteTicket {
            id: self.next_ticket_id.fetch_add(1, Ordering::SeqCst),
            user_id,
            event_id,
            satellite_id,
            promoted: false,
        };
        self.satellite_tickets
            .write()
            .await
            .insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn save_satellite_ticket(&self, ticket: &SatelliteTicket) -> StoreResult<()> {
        self.satellite_tickets
            .write()
            .await
            .insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn satellite_tickets(
        &self,
        satellite_id: SatelliteId,
    ) -> StoreResult<Vec<SatelliteTicket>> {
        let tickets = self.satellite_tickets.read().await;
        Ok(tickets
            .values()
            .filter(|t| t.satellite_id == satellite_id)
            .cloned()
            .collect())
    }

    async fn winner(&self, event_id: EventId, user_id: UserId) -> StoreResult<Option<Winner>> {
        Ok(self
            .winners
            .read()
            .await
            .get(&(event_id, user_id))
            .cloned())
    }

    async fn save_winner(&self, winner: &Winner) -> StoreResult<()> {
        self.winners
            .write()
            .await
            .insert((winner.event_id, winner.user_id), winner.clone());
        Ok(())
    }

    async fn winners_for_event(&self, event_id: EventId) -> StoreResult<Vec<Winner>> {
        let winners = self.winners.read().await;
        Ok(winners
            .values()
            .filter(|w| w.event_id == event_id)
            .cloned()
            .collect())
    }
}

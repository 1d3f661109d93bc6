//! Draw engine error types.

use super::models::SatelliteId;
use crate::store::StoreError;
use thiserror::Error;

/// Draw engine errors
#[derive(Debug, Error)]
pub enum DrawError {
    /// No event is currently running
    #[error("No active event")]
    EventNotFound,

    /// Referenced day does not exist
    #[error("Day {0} not found")]
    DayNotFound(u32),

    /// Referenced room does not exist
    #[error("Room {room} not found on day {day}")]
    RoomNotFound { day: u32, room: u32 },

    /// Referenced satellite round does not exist
    #[error("Satellite round not found: {0}")]
    SatelliteNotFound(SatelliteId),

    /// Internal defect: a packing or selection invariant broke mid-operation.
    /// Never tolerated; the operation aborts.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type DrawResult<T> = Result<T, DrawError>;

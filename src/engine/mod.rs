//! Draw engine: day coordination, per-room elimination and final selection.

pub mod elimination;
pub mod manager;

pub use elimination::{run_room_elimination, select_final};
pub use manager::DrawEngine;

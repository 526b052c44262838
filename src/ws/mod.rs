//! WebSocket bridge to the game page

pub mod handler;
pub mod protocol;

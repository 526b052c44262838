//! Best-effort persistence of the visited-position trail

pub mod client;
pub mod recorder;

pub use client::{GameSummary, PositionRecord, RecordKind, RecorderClient, RecorderError};
pub use recorder::Recorder;

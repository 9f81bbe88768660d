//! The rendered page and the mutations the bridge applies to it.

pub mod appliers;
pub mod document;
pub mod timers;

pub use appliers::{ApplyError, Appliers, LayoutFlags, Notifier};
pub use document::Document;
pub use timers::{TimerError, TimerRegistry};

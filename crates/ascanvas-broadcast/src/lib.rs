//! Canvas event broadcasting.
//!
//! Observers subscribe per canvas id (or to every canvas through
//! [`ascanvas_core::OBSERVE_ALL`]) and receive each change as a
//! [`ascanvas_core::CanvasEvent`] on their own channel.

pub mod memory;

pub use memory::MemoryBroadcaster;

//! Veneer Core Runtime
//!
//! This crate provides the foundational primitives for the Veneer overlay
//! scrollbar system:
//!
//! - **Change Caches**: previous-value + comparator memo cells that answer
//!   "did this actually change" without redundant writes
//! - **Geometry**: per-axis and box value types with field-wise equality
//! - **Listener Hubs**: single-threaded listener registries with revocation
//! - **Scheduler**: a deterministic virtual-time timer wheel plus the
//!   two-tier debouncer every observation source funnels through
//!
//! # Example
//!
//! ```rust
//! use veneer_core::cache::Cache;
//!
//! let mut overflow = Cache::new(0.0_f32);
//! let update = overflow.update(12.0);
//! assert!(update.changed);
//! assert!(!overflow.update(12.0).changed);
//! ```

pub mod cache;
pub mod error;
pub mod geometry;
pub mod hub;
pub mod scheduler;

pub use cache::{Cache, Updated};
pub use error::Error;
pub use geometry::{Trbl, Wh, Xy};
pub use hub::{EventHub, ListenerKey};
pub use scheduler::{Debouncer, Scheduler, TimerKey};

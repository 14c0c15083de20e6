//! Structure setup: skeleton, observation, update engine

pub mod elements;
pub mod observers;
pub mod update;

pub use elements::{StructureElements, StructureSetup};
pub use observers::{ObserversUpdateHints, StructureObservers};
pub use update::{StructureUpdater, UpdateHints, UpdateReason};

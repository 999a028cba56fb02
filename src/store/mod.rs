//! # Entity Store
//!
//! Normalized per-resource-type state: items, collection variants and the
//! requests currently in flight.
//!
//! The store is a plain value. It changes only through
//! [`ResourcesState::apply`], which takes one [`StoreEvent`] at a time, and is
//! read through the selector methods in [`selectors`].

pub mod event;
mod reducer;
pub mod selectors;
pub mod state;

pub use event::{StoreEvent, Target};
pub use state::{
    settled, CollectionState, EntityState, InFlight, ItemState, Pending, RequestId, ResourcesState,
};

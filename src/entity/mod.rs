//! Entity layer modules.
//!
//! This module groups the entity contracts, the plain entity used to build
//! foreign graphs, the native managed entity and the adapter for foreign
//! entities.

pub mod adapter;
pub mod basic;
pub mod managed;
pub mod traits;

pub use adapter::{BackoffConfig, ManagedEntityAdapter};
pub use basic::BasicEntity;
pub use managed::{Attachment, NativeEntity};
pub use traits::{Entity, ManagedEntity};

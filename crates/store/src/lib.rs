//! In-memory cache state store.
//!
//! This crate holds the live mirror of every `(version, kind)` cache the
//! application has observed, and folds backend events into it. Nothing here
//! is persisted: the store is rebuilt from backend queries and events at the
//! start of every session.
//!
//! # Architecture
//! - [`Store`]: one slot per `(uuid, kind)`. Each slot owns an immutable
//!   [`Arc`](std::sync::Arc) snapshot of its [`VersionCacheState`](buildcache_model::VersionCacheState)
//!   that is swapped wholesale on every mutation, a [`Generation`] counter,
//!   and the [`PassState`] of the current validation pass. Every mutation is
//!   broadcast to [`Subscription`]s while the write lock is still held, so
//!   subscribers see updates in the order they were applied.
//! - [`Reconciler`]: applies the two backend event protocols (and command
//!   completions) to the store, discarding stale, duplicate-superseded or
//!   protocol-violating input instead of failing.

mod reconcile;
mod slot;
mod store;
mod subscription;

pub use crate::reconcile::{IgnoreReason, PassOutcome, Reconciled, Reconciler};
pub use crate::slot::{Generation, PassState, SlotSnapshot, Ticket};
pub use crate::store::{Rearm, Store};
pub use crate::subscription::{StoreUpdate, Subscription};

/// Name of the synthetic item that carries the coarse protocol's byte count.
pub const COARSE_ITEM: &str = "*";

// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! State for the Driftbottle relay.
//!
//! [`Registry`] owns the user and letter collections and implements the user
//! registry and letter lifecycle on top of a [`CollectionStore`]
//! (JSON files on disk, or memory).
//!
//! [`CollectionStore`]: driftbottle_core::CollectionStore

pub mod letters;
pub mod persistence;
pub mod registry;
pub mod users;

pub use letters::{
    DeliveryStatus, LetterStatus, NextLetter, RoutingDecision, RoutingSnapshot, UnresolvedLetter,
};
pub use persistence::{load_collection, save_collection, JsonFileStore, MemoryCollectionStore};
pub use registry::{Letters, Registry, Users};
pub use users::validate_user_id;

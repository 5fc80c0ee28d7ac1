// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Node activation windows.
//!
//! A node may obtain a Vault token only while it has an active activation
//! record. Records live in a KV mount under a configurable base path, one
//! key per node ID, and expire on their own once `created + ttl` has
//! passed. A successful admission deactivates the record unless it was
//! created replayable.

mod error;
mod record;
mod store;

pub use error::{ActivationError, Result};
pub use record::ActivationRecord;
pub use store::{not_found_status, NodeActivationStore};

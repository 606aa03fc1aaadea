// Copyright 2026 Governor Contributors
// SPDX-License-Identifier: MIT

//! Shared helpers for the `governor` daemon binary: sync-file loading,
//! split out of `main.rs` so it's independently testable.

pub mod sync_file;

pub use sync_file::load_sync_config;

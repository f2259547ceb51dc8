// Copyright 2026 The Sysmem Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! A two-tier user-space memory management core: an ordered freelist, a
//! general-purpose dynamic allocator built on top of it, and a process-wide
//! thread-safe façade with per-tag byte accounting.
//!
//! Callers outside this crate are expected to go through [`facade`] only —
//! [`freelist`] and [`dynamic_allocator`] are public so other parts of a
//! larger system can reason about or test them directly, but they carry no
//! accounting and no thread safety of their own.

pub mod dynamic_allocator;
pub mod error;
pub mod facade;
pub mod freelist;
pub mod platform;
pub mod primitives;
pub mod tag;

pub use error::{MemoryError, Result};
pub use tag::Tag;

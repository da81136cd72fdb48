//! Shared API Types for Watchlist Screening
//!
//! This crate is the SINGLE SOURCE OF TRUTH for all types crossing the
//! caller boundary of the screening engine.
//!
//! ## Boundaries
//!
//! ```text
//! ┌──────────────────┐         ┌──────────────────┐
//! │  Request layer   │  JSON   │  Screening       │
//! │  (auth, limits)  │ ◄─────► │  engine          │
//! └──────────────────┘         └──────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. All boundary types live here - the engine converts at the edge
//! 2. camelCase field names, snake_case enum values
//! 3. Optional inputs are lenient; the engine validates once per batch

pub mod screening;

pub use screening::*;

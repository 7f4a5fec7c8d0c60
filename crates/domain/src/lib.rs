//! # hubkit-domain
//!
//! Pure domain model for the hubkit execution & scheduling subsystem.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Schedules** (`{hour, minute, second}` patterns with wildcards
//!   and strides) and their matching rules
//! - Define **Recurrences** (symbolic modes such as `EVERY_HOURS`) and their
//!   expansion into schedules, including registration-time jitter
//! - Define **Trigger keys** (deduplication keys for periodic registrations)
//! - Define **Service** states and execution modes
//! - Define **Delays** (relative offsets for one-shot scheduling)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod delay;
pub mod recurrence;
pub mod schedule;
pub mod service;
pub mod trigger;

//! # hamirror-domain
//!
//! Pure domain model for the hamirror hub mirror.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps
//! - Define **entity records** (the hub's state holders: sensors, locks, switches, …)
//! - Decode the hub's compact **delta protocol** into full records
//! - Resolve an entity to a **device descriptor** (capabilities, adapter kind, id prefix)
//! - Describe **devices** from the hub's catalog and the manifests surfaced to the host
//! - Define **service calls** (commands sent back to the hub)
//! - Convert numeric readings between display units and SI units
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod delta;
pub mod descriptor;
pub mod device;
pub mod entity;
pub mod service;
pub mod unit;

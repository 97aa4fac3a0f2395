//! # autoflow-domain
//!
//! Pure domain model for the autoflow on-device automation system.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Workflows** (nodes, port-labelled edges, typed node configs)
//! - Define the **Variable Scope** and its `{{path}}` template resolver
//! - Define **Geofences** (regions, trigger bindings, location samples, transitions)
//! - Define the reserved **trigger variables** injected by background events
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod geofence;
pub mod template;
pub mod trigger;
pub mod variables;
pub mod workflow;

//! ODM Comprehensive Test Suite
//!
//! Drives the public `docmap` facade over the in-memory store.
//!
//! ## Test Tier Structure
//!
//! - **Tier 1: Change Tracking** (insert documents, update sets, snapshots)
//! - **Tier 2: Field Filters** (rewrites, rejections, past values)
//! - **Tier 3: Reference Resolution** (batching, integrity, dynamic replay)
//! - **Tier 4: Lifecycle Hooks** (ordering, payload edits, aborts)
//! - **Tier 5: Configuration** (`docmap.toml`, identity field, skip mode)
//! - **Tier 6: Property-Based** (random edit/save sequences)
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole suite
//! cargo test --test odm_comprehensive
//!
//! # Run one tier
//! cargo test --test odm_comprehensive tier3
//! ```

mod test_utils;

// Tier 1: Change Tracking
mod tier1_change_tracking;

// Tier 2: Field Filters
mod tier2_filters;


// Tier 4: Lifecycle Hooks
mod tier4_lifecycle_hooks;

// Tier 5: Configuration
mod tier5_configuration;

// Tier 6: Property-Based
mod tier6_properties;

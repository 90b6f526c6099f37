//! # Manager Sample Library
//!
//! A catalog and ordering system built from three manager types over the
//! in-memory backend. Exposed as a library for the integration tests.
//!
//! - **[model]**: schema, validators and typed views ([`model::Product`], [`model::Order`], [`model::LineItem`]).
//! - **[policy]**: role-based authorization rules per entity.
//! - **[managers]**: the manager type definitions and their defaults.
//! - **[lifecycle]**: [`lifecycle::CatalogSystem`], which wires everything together.

pub mod error;
pub mod lifecycle;
pub mod managers;
pub mod model;
pub mod policy;

pub use error::SampleError;

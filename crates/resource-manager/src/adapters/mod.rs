//! # Collaborator Adapters
//!
//! Narrow interfaces over the authorization, search and pagination engines.
//! Each category has built-in variants selected by the configuration registry;
//! a caller-supplied implementation of the same trait is the `custom` choice.

pub mod authorization;
pub mod pagination;
pub mod search;

pub use authorization::{AllowAll, Authorizer, Policy, PolicyAuthorizer, Subject};
pub use pagination::{OffsetPaginator, Paginator, Unpaged, DEFAULT_PAGE_SIZE};
pub use search::{NoSearch, PredicateSearch, Searcher};

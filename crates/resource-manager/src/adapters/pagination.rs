//! Pagination adapters.

use crate::backend::Backend;
use tracing::debug;

/// Page size used when a page number resolves without a size.
pub const DEFAULT_PAGE_SIZE: u64 = 25;

/// The pagination collaborator.
pub trait Paginator<B: Backend>: Send + Sync {
    /// `page` is 1-based; `None` means the first page.
    fn paginate(&self, backend: &B, scope: B::Query, page: Option<u64>, size: u64) -> B::Query;
}

/// `none`: the scope is returned unpaged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpaged;

impl<B: Backend> Paginator<B> for Unpaged {
    fn paginate(&self, _backend: &B, scope: B::Query, _page: Option<u64>, _size: u64) -> B::Query {
        scope
    }
}

/// `offset`: limit/offset windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct OffsetPaginator;

impl OffsetPaginator {
    /// Offset of the first row of `page`. Page zero is treated as page one.
    pub fn offset(page: Option<u64>, size: u64) -> u64 {
        page.unwrap_or(1).max(1).saturating_sub(1).saturating_mul(size)
    }
}

impl<B: Backend> Paginator<B> for OffsetPaginator {
    fn paginate(&self, backend: &B, scope: B::Query, page: Option<u64>, size: u64) -> B::Query {
        let offset = Self::offset(page, size);
        debug!(?page, size, offset, "Paginating");
        backend.limit_offset(scope, size, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EntityType;
    use crate::mock::{MockBackend, MockSchema};

    #[test]
    fn test_offsets_are_one_based() {
        assert_eq!(OffsetPaginator::offset(None, 10), 0);
        assert_eq!(OffsetPaginator::offset(Some(0), 10), 0);
        assert_eq!(OffsetPaginator::offset(Some(1), 10), 0);
        assert_eq!(OffsetPaginator::offset(Some(3), 10), 20);
    }

    #[test]
    fn test_offset_paginator_sets_limit_and_offset() {
        let backend = MockBackend::new(MockSchema::new());
        let base = backend.scope(&EntityType::new("Product"));
        let paged = OffsetPaginator.paginate(&backend, base.clone(), Some(2), 5);
        assert_eq!((paged.limit, paged.offset), (Some(5), 5));

        let unpaged = Unpaged.paginate(&backend, base.clone(), Some(2), 5);
        assert_eq!(unpaged, base);
    }
}

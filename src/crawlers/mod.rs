pub mod batch;
pub mod crawler;
pub mod fingerprint;
pub mod http;
pub mod pagination;
pub mod render;

#[cfg(test)]
mod tests;

pub use batch::{BatchRequest, BatchResult, RegionIterator, ScrapeBatchState};
pub use crawler::{PageSession, Sessions};
pub use http::{FallbackFetcher, HttpSession, fetch_catalog_with};
pub use pagination::{PaginationOutcome, StopReason, find_next_link, paginate};
pub use render::{RenderAgent, RenderSession};

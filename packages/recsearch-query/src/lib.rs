//! Builds search-proxy request bodies for record data sources.
//!
//! A source runs in one of three modes: raw documents with offset paging, a composite
//! aggregation paged by after-key, or a term aggregation grouped on the source's unique field.

pub mod builder;
pub mod field;
pub mod filter;
pub mod response;
pub mod settings;
pub mod snapshot;

mod error;

pub use builder::{BuiltRequest, QueryRequestBuilder};
pub use error::{Error, Result};
pub use field::{FieldSpec, KeywordFields};
pub use filter::{Bounds, Filter, FilterClause, GeoPoint, RowFilter};
pub use response::SearchResponse;
pub use settings::{Direction, Mode, QuerySettings, SortField};
pub use snapshot::RequestSnapshot;

/// Composite aggregation holding one bucket per row.
pub const ROWS_AGG: &str = "_rows";
/// Term aggregation grouping on the unique field.
pub const ID_FIELD_AGG: &str = "_idfield";
/// Cardinality of the unique field, included only when the filter changed.
pub const COUNT_AGG: &str = "_count";
/// Top hit per term bucket carrying the fields to render.
pub const FIELD_LIST_AGG: &str = "fieldlist";
/// Max reducer used to order term buckets on a plain field.
pub const SORT_FIELD_AGG: &str = "sortfield";
/// Prefix for sort aggregation overrides.
pub const ORDER_BY_PREFIX: &str = "orderby_";

pub const DEFAULT_AGGREGATION_SIZE: u32 = 10_000;
pub const DEFAULT_PAGE_SIZE: u32 = 30;

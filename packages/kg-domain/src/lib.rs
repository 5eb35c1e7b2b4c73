//! Synchronous building blocks of the association engine: identifiers, datasource weighting,
//! score combination, aggregation filters, facet counting and pagination.

pub mod association;
pub mod datasource;
pub mod facet;
pub mod filter;
pub mod id;
pub mod page;
pub mod score;

mod error;

pub use association::{Annotations, Association, AssociationScore, DatasourceScore};
pub use datasource::{DatasourceSetting, ResolvedWeights};
pub use error::{Error, Result};
pub use facet::{FacetCatalog, FacetCount, FacetSource};
pub use filter::{AggregationFilter, RawAggregationFilter};
pub use id::{ClosureRelation, DatasourceId, EntityId, EntityKind, IdentifierSet};
pub use kg_config::DATASOURCE_DIMENSION;
pub use page::{Cursor, Pagination, ScoreOrder};
pub use score::ScoreCombiner;

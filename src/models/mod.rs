pub mod case_result;
pub mod hedge;
pub mod loaders;
pub mod query;

pub use case_result::{BiasCount, CaseResult};
pub use hedge::HedgeDefinition;
pub use loaders::{load_hedges, load_queries};
pub use query::{Query, SortOrder};

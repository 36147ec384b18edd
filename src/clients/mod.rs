pub mod eutils_client;
pub mod response;

pub use eutils_client::{EutilsClient, SearchRequest, DEFAULT_DATABASE};
pub use response::{DbInfo, Reply, SearchHandle, SearchResult};

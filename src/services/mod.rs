pub mod archive;
pub mod error_log;
pub mod results_writer;
pub mod sampler;

pub use archive::ResponseArchive;
pub use error_log::ErrorLog;
pub use results_writer::ResultsWriter;
pub use sampler::{sample_queries, Sample};

pub mod country_split;
pub mod csv_source;
pub mod schema;

pub use country_split::{split_by_country, SplitSummary};
pub use csv_source::{country_inputs, CsvRecordSource, RecordSource, RecordStream, SourceRow};
pub use schema::RecordSchema;

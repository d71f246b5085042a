pub mod csv_sink;
pub mod layout;
pub mod summary;

pub use csv_sink::{CsvRecordSink, RowWriter, WriteMode};
pub use layout::OutputLayout;
pub use summary::{write_keyword_summary, write_run_report, AggregationConsumer, JsonSummaryConsumer};

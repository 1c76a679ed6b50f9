pub mod csv_dialect;
pub mod fallback;
pub mod table_dumper;

pub use table_dumper::{DumpOutcome, TableDumper};

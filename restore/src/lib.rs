pub mod fifo;
pub mod table_restorer;

pub use table_restorer::{discover_shards, ShardKind, TableRestorer};

pub mod reader;
pub mod writer;

pub use reader::decompress_to_path;
pub use writer::CompressedWriter;

pub mod rewrite;
pub mod stage_split;

pub use rewrite::{detokenise, strip_alter_database_lines, strip_definer, tokenise};
pub use stage_split::{split_stages, StageOutput};

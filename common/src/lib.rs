pub mod config;
pub mod err;
pub mod layout;
pub mod logging;
pub mod pretty;

pub use err::{AccelError, CResult};

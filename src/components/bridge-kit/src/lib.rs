mod log_util;
mod path;

pub use log_util::*;
pub use path::*;

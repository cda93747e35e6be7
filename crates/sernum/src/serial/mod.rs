mod error;
mod format;
mod number;

pub use error::*;
pub use format::*;
pub use number::*;

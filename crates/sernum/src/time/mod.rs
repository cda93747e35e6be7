mod interface;
mod month;

pub use interface::*;
pub use month::*;

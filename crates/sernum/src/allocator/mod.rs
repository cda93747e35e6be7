mod batch;
mod error;
mod retry;
#[cfg(test)]
mod tests;

pub use batch::*;
pub use error::*;
pub use retry::*;

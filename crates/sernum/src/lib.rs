#![doc = include_str!("../README.md")]

mod allocator;
mod auth;
mod export;
mod rand;
mod record;
mod report;
mod serial;
mod service;
mod store;
mod time;

pub use crate::allocator::*;
pub use crate::auth::*;
pub use crate::export::*;
pub use crate::rand::*;
pub use crate::record::*;
pub use crate::report::*;
pub use crate::serial::*;
pub use crate::service::*;
pub use crate::store::*;
pub use crate::time::*;

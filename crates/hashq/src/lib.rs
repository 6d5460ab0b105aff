#![doc = include_str!("../README.md")]

mod digest;
mod error;
mod lifecycle;
mod service;
mod stats;
mod store;
mod time;

#[cfg(test)]
mod tests;

pub use crate::digest::*;
pub use crate::error::*;
pub use crate::lifecycle::*;
pub use crate::service::*;
pub use crate::stats::*;
pub use crate::store::*;
pub use crate::time::*;

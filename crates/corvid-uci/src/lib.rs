//! UCI protocol handling for corvid.

pub mod command;
pub mod engine;
pub mod error;
pub mod notation;

pub use command::GoParams;
pub use engine::UciEngine;
pub use error::UciError;

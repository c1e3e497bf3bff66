//! Shared data model and wire formats for `taskcrew`.

pub mod codec;
pub mod command;
pub mod error;
pub mod load;
pub mod ops;
pub mod task;

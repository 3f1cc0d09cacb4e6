//! Command implementations

pub mod apply;
pub mod generate;
pub mod info;

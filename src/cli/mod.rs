//! Subcommand implementations for the `tdc` binary.

pub mod constants;
pub mod metadata;
pub mod pack;
pub mod process;
pub mod unpack;

pub use constants::{display_level, set_display_level};

//! Mask inspection and editing commands behind the `harbor` binary.

pub mod commands;

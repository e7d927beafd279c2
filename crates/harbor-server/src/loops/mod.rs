//! Background loops.

pub mod weather_prune_loop;

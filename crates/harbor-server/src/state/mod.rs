//! Shared server state.

pub mod restricted;
pub mod store;
pub mod weather;

pub use restricted::RestrictedAreaStore;
pub use store::AppState;
pub use weather::{WeatherReport, WeatherStore};

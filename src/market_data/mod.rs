pub mod candle;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{avg_volume, closes_oldest_first, load_window, Candle};

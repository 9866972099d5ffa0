pub mod client;
pub mod error;

pub use client::BinanceFuturesClient;
pub use error::FetchError;

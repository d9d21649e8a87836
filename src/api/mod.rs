//! External market-data collaborators: price source, retry policy and
//! candidate universe.

mod feed;
#[cfg(test)]
pub mod mock;
mod price_client;
mod retry;
mod source;
mod types;
mod universe_client;

pub use feed::PriceFeed;
pub use price_client::YahooPriceClient;
pub use retry::RetryPolicy;
pub use source::{PriceError, PriceMap, PriceSource};
pub use universe_client::UniverseClient;

pub mod factory;
mod traits;

pub use factory::build_broker_client;
#[cfg(test)]
pub use traits::MockBrokerClient;
pub use traits::{
    AccountSummary, BrokerClient, BrokerFill, BrokerResult, ClosedTrade, MarketOrderRequest,
    PriceQuote,
};

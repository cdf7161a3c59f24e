pub mod api_server;
pub mod memory;
pub mod oanda;
pub mod postgres;

pub use api_server::start_api_server;
pub use memory::MemoryLedger;
pub use oanda::OandaClient;
pub use postgres::PostgresLedger;

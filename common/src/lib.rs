// Shared Domain Layer
// Games, markets, observation records and the data-access contract

pub mod memory;
pub mod repository;
pub mod types;

pub use memory::InMemoryRepository;
pub use repository::MarketDataRepository;
pub use types::{
    BetType, BettingSplit, DataSource, GameRecord, LineSnapshot, OddsSnapshot, Side, Sport,
    TimeWindow,
};

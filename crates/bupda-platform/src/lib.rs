pub mod config;
pub mod contracts;
pub mod db;
pub mod repository;

pub use config::ServiceConfig;
pub use contracts::{
    AccountNumberResponse, ApiEnvelope, ChannelQuery, DebitRequest, HealthResponse,
    IndexDateQuery, MonthQuery, MutationQuery, OrderListQuery, VirtualAccountResponse,
};
pub use db::connect_database;
pub use repository::{PgOrderStore, PgUserStore};

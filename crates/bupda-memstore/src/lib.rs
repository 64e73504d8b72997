//! In-memory stores and a scripted ledger, used by service and HTTP tests.

mod ledger;
mod orders;
mod users;

pub use ledger::{LedgerCall, LedgerScript, SimulatedLedger};
pub use orders::InMemoryOrderStore;
pub use users::InMemoryUserStore;

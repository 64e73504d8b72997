//! GraphQL client for the BUPDA micro-finance ledger.

mod client;
mod documents;

pub use client::GraphqlLedger;

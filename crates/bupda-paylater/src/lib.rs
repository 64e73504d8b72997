//! Paylater purchases, bill settlement, channel pricing and account queries.

mod accounts;
mod context;
mod numbering;
mod orchestrator;
mod orders;
mod presenter;
mod usage;

#[cfg(test)]
mod testkit;

pub use accounts::AccountService;
pub use context::RequestContext;
pub use numbering::{BILL_NUMBER_PREFIX, ORDER_NUMBER_PREFIX, generate_order_number};
pub use orchestrator::{CheckoutRequest, PaylaterService};
pub use orders::{OrderService, PaylaterMonth};
pub use presenter::{ChannelQuote, PaymentChannelPresenter};

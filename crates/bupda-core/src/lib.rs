pub mod error;
pub mod ledger;
pub mod models;
pub mod policy;
pub mod storage;

pub use error::{
    LEDGER_UNAVAILABLE_MESSAGE, ServiceError, VENDOR_ERROR_PREFIX, strip_vendor_prefix,
};
pub use ledger::{
    AccountBalance, Arrear, BillItem, LedgerCredential, LedgerError, LedgerGateway, LoanRequest,
    MemberRegistration, Mutation, PaylaterLimit, SettlementQuote,
};
pub use models::{
    AccountKind, AccountType, DesaContext, Order, OrderPatch, OrderStatus, PaylaterFlag,
    PaymentChannel, PaymentMethod, PaymentStatus, User, UserAccount,
};
pub use policy::{MonthWindow, PaylaterPolicy, Surcharge};
pub use storage::{OrderStore, PaymentChannelStore, UserStore};

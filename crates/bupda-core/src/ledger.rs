use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCredential {
    pub member_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanRequest {
    pub member_id: String,
    pub account_id: String,
    pub principal: Decimal,
    pub total_amount: Decimal,
    pub is_merchant: bool,
    pub interest_rate: Decimal,
    pub loan_product_id: String,
    pub destination_account: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRegistration {
    pub email: String,
    pub phone: String,
    pub nik: String,
    pub address: String,
    pub member_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub loan_id: String,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrear {
    pub loan_id: String,
    pub principal: Decimal,
    pub interest: Decimal,
    pub penalty: Decimal,
    pub days_past_due: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaylaterLimit {
    pub max_limit: Decimal,
    pub used: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    pub balance: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub posted_at: DateTime<Utc>,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementQuote {
    pub loan_id: String,
    pub principal: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
    #[error("unexpected ledger payload: {0}")]
    Decode(String),
}

// Every call is a single attempt; callers decide what a failure means.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn activate_member(&self, registration: &MemberRegistration)
    -> Result<(), LedgerError>;

    async fn group_balance(&self, access_token: &str, group_account: &str)
    -> Result<Decimal, LedgerError>;

    async fn loan_interest_rate(&self, access_token: &str) -> Result<Decimal, LedgerError>;

    async fn loan_product_id(&self, access_token: &str) -> Result<String, LedgerError>;

    async fn create_loan(&self, access_token: &str, request: &LoanRequest)
    -> Result<(), LedgerError>;

    async fn debit_installment(&self, access_token: &str, loan_id: &str)
    -> Result<(), LedgerError>;

    async fn outstanding_bill(
        &self,
        credential: &LedgerCredential,
    ) -> Result<Option<Vec<BillItem>>, LedgerError>;

    async fn settle_bill(&self, credential: &LedgerCredential) -> Result<(), LedgerError>;

    async fn settlement_quotes(
        &self,
        credential: &LedgerCredential,
    ) -> Result<Vec<SettlementQuote>, LedgerError>;

    async fn arrears(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Option<Vec<Arrear>>, LedgerError>;

    async fn paylater_limit(
        &self,
        credential: &LedgerCredential,
    ) -> Result<PaylaterLimit, LedgerError>;

    async fn account_balance(
        &self,
        access_token: &str,
        account: &str,
    ) -> Result<AccountBalance, LedgerError>;

    async fn mutations(
        &self,
        access_token: &str,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Mutation>, LedgerError>;
}

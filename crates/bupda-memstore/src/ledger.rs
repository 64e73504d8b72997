use async_trait::async_trait;
use bupda_core::{
    AccountBalance, Arrear, BillItem, LedgerCredential, LedgerError, LedgerGateway, LoanRequest,
    MemberRegistration, Mutation, PaylaterLimit, SettlementQuote,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

/// Canned answers returned by [`SimulatedLedger`]. The default models a
/// healthy ledger with a funded group account and nothing outstanding.
#[derive(Debug, Clone)]
pub struct LedgerScript {
    pub activate_member: Result<(), LedgerError>,
    pub group_balance: Result<Decimal, LedgerError>,
    pub interest_rate: Result<Decimal, LedgerError>,
    pub loan_product_id: Result<String, LedgerError>,
    pub create_loan: Result<(), LedgerError>,
    pub debit_installment: Result<(), LedgerError>,
    pub outstanding_bill: Result<Option<Vec<BillItem>>, LedgerError>,
    pub settle_bill: Result<(), LedgerError>,
    pub settlement_quotes: Result<Vec<SettlementQuote>, LedgerError>,
    pub arrears: Result<Option<Vec<Arrear>>, LedgerError>,
    pub paylater_limit: Result<PaylaterLimit, LedgerError>,
    pub account_balance: Result<AccountBalance, LedgerError>,
    pub mutations: Result<Vec<Mutation>, LedgerError>,
}

impl Default for LedgerScript {
    fn default() -> Self {
        Self {
            activate_member: Ok(()),
            group_balance: Ok(Decimal::new(50_000_000, 0)),
            interest_rate: Ok(Decimal::new(15, 1)),
            loan_product_id: Ok("PL-01".to_string()),
            create_loan: Ok(()),
            debit_installment: Ok(()),
            outstanding_bill: Ok(None),
            settle_bill: Ok(()),
            settlement_quotes: Ok(Vec::new()),
            arrears: Ok(None),
            paylater_limit: Ok(PaylaterLimit {
                max_limit: Decimal::new(5_000_000, 0),
                used: Decimal::ZERO,
                available: Decimal::new(5_000_000, 0),
            }),
            account_balance: Ok(AccountBalance {
                account: String::new(),
                balance: Decimal::ZERO,
                available: Decimal::ZERO,
            }),
            mutations: Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCall {
    ActivateMember(MemberRegistration),
    GroupBalance { group_account: String },
    InterestRate,
    LoanProductId,
    CreateLoan(LoanRequest),
    DebitInstallment { loan_id: String },
    OutstandingBill { member_id: String },
    SettleBill { member_id: String },
    SettlementQuotes { member_id: String },
    Arrears { account_id: String },
    PaylaterLimit { member_id: String },
    AccountBalance { account: String },
    Mutations { account_id: String, start: NaiveDate, end: NaiveDate },
}

#[derive(Default)]
pub struct SimulatedLedger {
    script: RwLock<LedgerScript>,
    calls: RwLock<Vec<LedgerCall>>,
}

impl SimulatedLedger {
    pub fn new(script: LedgerScript) -> Self {
        Self {
            script: RwLock::new(script),
            calls: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_script(&self, script: LedgerScript) {
        *self.script.write().await = script;
    }

    pub async fn calls(&self) -> Vec<LedgerCall> {
        self.calls.read().await.clone()
    }

    pub async fn loans(&self) -> Vec<LoanRequest> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                LedgerCall::CreateLoan(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: LedgerCall) -> LedgerScript {
        self.calls.write().await.push(call);
        self.script.read().await.clone()
    }
}

#[async_trait]
impl LedgerGateway for SimulatedLedger {
    async fn activate_member(
        &self,
        registration: &MemberRegistration,
    ) -> Result<(), LedgerError> {
        self.record(LedgerCall::ActivateMember(registration.clone()))
            .await
            .activate_member
    }

    async fn group_balance(
        &self,
        _access_token: &str,
        group_account: &str,
    ) -> Result<Decimal, LedgerError> {
        self.record(LedgerCall::GroupBalance {
            group_account: group_account.to_string(),
        })
        .await
        .group_balance
    }

    async fn loan_interest_rate(&self, _access_token: &str) -> Result<Decimal, LedgerError> {
        self.record(LedgerCall::InterestRate).await.interest_rate
    }

    async fn loan_product_id(&self, _access_token: &str) -> Result<String, LedgerError> {
        self.record(LedgerCall::LoanProductId).await.loan_product_id
    }

    async fn create_loan(
        &self,
        _access_token: &str,
        request: &LoanRequest,
    ) -> Result<(), LedgerError> {
        self.record(LedgerCall::CreateLoan(request.clone()))
            .await
            .create_loan
    }

    async fn debit_installment(
        &self,
        _access_token: &str,
        loan_id: &str,
    ) -> Result<(), LedgerError> {
        self.record(LedgerCall::DebitInstallment {
            loan_id: loan_id.to_string(),
        })
        .await
        .debit_installment
    }

    async fn outstanding_bill(
        &self,
        credential: &LedgerCredential,
    ) -> Result<Option<Vec<BillItem>>, LedgerError> {
        self.record(LedgerCall::OutstandingBill {
            member_id: credential.member_id.clone(),
        })
        .await
        .outstanding_bill
    }

    async fn settle_bill(&self, credential: &LedgerCredential) -> Result<(), LedgerError> {
        self.record(LedgerCall::SettleBill {
            member_id: credential.member_id.clone(),
        })
        .await
        .settle_bill
    }

    async fn settlement_quotes(
        &self,
        credential: &LedgerCredential,
    ) -> Result<Vec<SettlementQuote>, LedgerError> {
        self.record(LedgerCall::SettlementQuotes {
            member_id: credential.member_id.clone(),
        })
        .await
        .settlement_quotes
    }

    async fn arrears(
        &self,
        _access_token: &str,
        account_id: &str,
    ) -> Result<Option<Vec<Arrear>>, LedgerError> {
        self.record(LedgerCall::Arrears {
            account_id: account_id.to_string(),
        })
        .await
        .arrears
    }

    async fn paylater_limit(
        &self,
        credential: &LedgerCredential,
    ) -> Result<PaylaterLimit, LedgerError> {
        self.record(LedgerCall::PaylaterLimit {
            member_id: credential.member_id.clone(),
        })
        .await
        .paylater_limit
    }

    async fn account_balance(
        &self,
        _access_token: &str,
        account: &str,
    ) -> Result<AccountBalance, LedgerError> {
        self.record(LedgerCall::AccountBalance {
            account: account.to_string(),
        })
        .await
        .account_balance
    }

    async fn mutations(
        &self,
        _access_token: &str,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Mutation>, LedgerError> {
        self.record(LedgerCall::Mutations {
            account_id: account_id.to_string(),
            start,
            end,
        })
        .await
        .mutations
    }
}

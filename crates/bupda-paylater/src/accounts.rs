use std::sync::Arc;

use bupda_core::{
    AccountBalance, Arrear, BillItem, LedgerGateway, MemberRegistration, Mutation, PaylaterLimit,
    ServiceError, SettlementQuote, UserAccount, UserStore,
};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::context::{RequestContext, load_user, require_credential};

const VA_PHONE_LENGTH: usize = 12;

// Nothing is cached; every read goes to the ledger.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerGateway>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, ledger: Arc<dyn LedgerGateway>) -> Self {
        Self { users, ledger }
    }

    // The member id and token are issued later by the ledger, out of band.
    pub async fn activate_member(&self, ctx: &RequestContext) -> Result<(), ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        if user
            .ledger_member_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
        {
            return Err(ServiceError::bad_request("user already activated"));
        }

        let registration = MemberRegistration {
            email: user.email.clone(),
            phone: user.phone.clone(),
            nik: user.nik.clone(),
            address: user.address.clone(),
            member_name: user.full_name.clone(),
        };
        self.ledger.activate_member(&registration).await?;

        info!(
            request_id = %ctx.request_id,
            user_id = %ctx.user_id,
            "ledger registration submitted"
        );
        Ok(())
    }

    pub async fn account_number(&self, ctx: &RequestContext) -> Result<String, ServiceError> {
        let account = self
            .users
            .find_savings_account(ctx.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("rekening not found"))?;
        Ok(account.code)
    }

    pub async fn virtual_account(&self, ctx: &RequestContext) -> Result<String, ServiceError> {
        let account = self.savings_account(ctx).await?;
        let user = load_user(self.users.as_ref(), ctx).await?;
        virtual_account_number(&account.bin, &user.phone).ok_or_else(|| {
            warn!(
                request_id = %ctx.request_id,
                user_id = %ctx.user_id,
                "phone {} too long for a virtual account",
                user.phone
            );
            ServiceError::not_found("user phone not valid")
        })
    }

    pub async fn paylater_limit(&self, ctx: &RequestContext) -> Result<PaylaterLimit, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        Ok(self.ledger.paylater_limit(&credential).await?)
    }

    pub async fn arrears(&self, ctx: &RequestContext) -> Result<Vec<Arrear>, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        let account = self.paylater_account(ctx).await?;

        match self
            .ledger
            .arrears(&credential.access_token, &account.id_account)
            .await?
        {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(ServiceError::not_found("tunggakan not found")),
        }
    }

    // Simpanan khusus lives on the paylater account.
    pub async fn special_savings_balance(
        &self,
        ctx: &RequestContext,
    ) -> Result<AccountBalance, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        let account = self.paylater_account(ctx).await?;
        Ok(self
            .ledger
            .account_balance(&credential.access_token, &account.id_account)
            .await?)
    }

    pub async fn bima_balance(&self, ctx: &RequestContext) -> Result<AccountBalance, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        let account = self.savings_account(ctx).await?;
        Ok(self
            .ledger
            .account_balance(&credential.access_token, &account.code)
            .await?)
    }

    pub async fn bima_mutations(
        &self,
        ctx: &RequestContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Mutation>, ServiceError> {
        if start > end {
            return Err(ServiceError::bad_request("start date is after end date"));
        }

        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        let account = self.savings_account(ctx).await?;
        let mutations = self
            .ledger
            .mutations(&credential.access_token, &account.id_account, start, end)
            .await?;
        if mutations.is_empty() {
            return Err(ServiceError::not_found("mutasi not found"));
        }

        info!(
            request_id = %ctx.request_id,
            user_id = %ctx.user_id,
            "{} mutations between {start} and {end}",
            mutations.len()
        );
        Ok(mutations)
    }

    pub async fn outstanding_bill(&self, ctx: &RequestContext) -> Result<Vec<BillItem>, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        match self.ledger.outstanding_bill(&credential).await? {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(ServiceError::not_found("TAGIHAN NOT FOUND")),
        }
    }

    pub async fn settlement_quotes(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<SettlementQuote>, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        let quotes = self.ledger.settlement_quotes(&credential).await?;
        if quotes.is_empty() {
            return Err(ServiceError::not_found("tagihan pelunasan not found"));
        }
        Ok(quotes)
    }

    async fn paylater_account(&self, ctx: &RequestContext) -> Result<UserAccount, ServiceError> {
        self.users
            .find_paylater_account(ctx.user_id)
            .await?
            .ok_or_else(|| ServiceError::bad_request("user account paylater not found"))
    }

    async fn savings_account(&self, ctx: &RequestContext) -> Result<UserAccount, ServiceError> {
        self.users
            .find_savings_account(ctx.user_id)
            .await?
            .ok_or_else(|| ServiceError::bad_request("user account tabungan bima not found"))
    }
}

/// BIN followed by the phone number without its first "08", zero-padded to
/// the width of a 12-digit phone. Longer phones have no VA.
fn virtual_account_number(bin: &str, phone: &str) -> Option<String> {
    let local = phone.replacen("08", "", 1);
    match phone.len() {
        VA_PHONE_LENGTH => Some(format!("{bin}{local}")),
        len if len < VA_PHONE_LENGTH => Some(format!("{bin}0{local}")),
        _ => None,
    }
}

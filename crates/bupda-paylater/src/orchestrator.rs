use std::sync::Arc;

use bupda_core::models::{
    ORDER_TYPE_PAYLATER_SETTLEMENT, ORDER_TYPE_PURCHASE, PRODUCT_TYPE_PAYMENT,
    PRODUCT_TYPE_PRODUCT,
};
use bupda_core::{
    DesaContext, LedgerGateway, LoanRequest, Order, OrderStatus, OrderStore, PaylaterPolicy,
    PaymentMethod, PaymentStatus, ServiceError, User, UserStore,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::{RequestContext, load_user, require_credential};
use crate::numbering::{BILL_NUMBER_PREFIX, ORDER_NUMBER_PREFIX, unique_order_number};
use crate::usage::{MonthUsage, ensure_flag, month_usage};

const MAX_TIER_ATTEMPTS: usize = 3;
const UNAVAILABLE_MESSAGE: &str = "Mohon maaf transaksi belum bisa dilakukan";

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub sub_total: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
}

#[derive(Clone)]
pub struct PaylaterService {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerGateway>,
    policy: PaylaterPolicy,
}

impl PaylaterService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn LedgerGateway>,
        policy: PaylaterPolicy,
    ) -> Self {
        Self {
            orders,
            users,
            ledger,
            policy,
        }
    }

    pub async fn checkout(
        &self,
        ctx: &RequestContext,
        request: &CheckoutRequest,
    ) -> Result<Order, ServiceError> {
        if request.sub_total <= Decimal::ZERO {
            return Err(ServiceError::bad_request("sub_total must be positive"));
        }
        if request.shipping_cost < Decimal::ZERO {
            return Err(ServiceError::bad_request("shipping_cost must not be negative"));
        }

        let user = load_user(self.users.as_ref(), ctx).await?;
        if !user.can_use_paylater() {
            return Err(ServiceError::bad_request("paylater belum aktif"));
        }
        let id_desa = user
            .id_desa
            .ok_or_else(|| ServiceError::bad_request("user is not linked to a desa"))?;
        let desa = self
            .users
            .find_desa(id_desa)
            .await?
            .ok_or_else(|| ServiceError::not_found("desa not found"))?;

        let now = Utc::now();
        let bill = request.sub_total + request.shipping_cost;
        let usage = month_usage(self.orders.as_ref(), &self.policy, user.id, now).await?;
        let flag_tier = self
            .users
            .find_flag(user.id, usage.window.start)
            .await?
            .map(|flag| flag.tier);
        let fee = self
            .policy
            .quote_surcharge(usage.total, usage.orders, bill, flag_tier);

        let number_order = unique_order_number(
            self.orders.as_ref(),
            ORDER_NUMBER_PREFIX,
            now,
            self.policy.utc_offset,
        )
        .await?;

        let mut order = self.pay_with_paylater(ctx, &user, &desa, bill, fee).await?;
        order.number_order = number_order;
        order.sub_total = request.sub_total;
        order.shipping_cost = request.shipping_cost;

        if let Err(err) = self.orders.create_order(&order).await {
            error!(
                target: "reconciliation",
                request_id = %ctx.request_id,
                user_id = %user.id,
                order_id = %order.id,
                number_order = %order.number_order,
                amount = %order.total_bill,
                "paylater loan issued but order was not stored: {err:#}"
            );
            return Err(ServiceError::Internal(format!(
                "failed to persist order {}: {err:#}",
                order.number_order
            )));
        }

        info!(
            request_id = %ctx.request_id,
            user_id = %user.id,
            "paylater checkout {} total={} fee={}",
            order.number_order, order.total_bill, order.payment_fee
        );
        Ok(order)
    }

    /// Gates the purchase, opens the loan at the ledger and ratchets the
    /// month's tier. The returned order is not stored and has no number yet.
    pub async fn pay_with_paylater(
        &self,
        ctx: &RequestContext,
        user: &User,
        desa: &DesaContext,
        total_bill: Decimal,
        payment_fee: Decimal,
    ) -> Result<Order, ServiceError> {
        if total_bill < Decimal::ZERO || payment_fee < Decimal::ZERO {
            return Err(ServiceError::bad_request("amounts must not be negative"));
        }

        let now = Utc::now();
        let cutoff = self.policy.delinquency_cutoff(now)?;
        let unpaid = self.orders.find_unpaid_paylater(user.id).await?;
        if unpaid.iter().any(|order| order.ordered_at < cutoff) {
            warn!(
                request_id = %ctx.request_id,
                user_id = %user.id,
                "paylater rejected: arrears older than {} months",
                self.policy.delinquency_months
            );
            return Err(ServiceError::bad_request(format!(
                "Masih ada tunggakan selama {} bulan yang belum dibayar",
                self.policy.delinquency_months
            )));
        }

        let credential = require_credential(user)?;
        let token = credential.access_token.as_str();

        match self.ledger.group_balance(token, &desa.group_id_bupda).await {
            Ok(balance) if balance > Decimal::ZERO => {}
            Ok(balance) => {
                warn!(
                    request_id = %ctx.request_id,
                    group = %desa.group_id_bupda,
                    "bupda pool exhausted, balance={balance}"
                );
                return Err(ServiceError::Unavailable(UNAVAILABLE_MESSAGE.to_string()));
            }
            Err(err) => {
                warn!(
                    request_id = %ctx.request_id,
                    group = %desa.group_id_bupda,
                    "bupda balance lookup failed: {err}"
                );
                return Err(ServiceError::Unavailable(UNAVAILABLE_MESSAGE.to_string()));
            }
        }

        let interest_rate = self.ledger.loan_interest_rate(token).await?;
        let loan_product_id = self.ledger.loan_product_id(token).await?;
        if loan_product_id.trim().is_empty() {
            return Err(ServiceError::Upstream("loan product id not found".to_string()));
        }

        let account = self
            .users
            .find_paylater_account(user.id)
            .await?
            .ok_or_else(|| ServiceError::bad_request("user account paylater not found"))?;

        let amount = total_bill + payment_fee;
        let loan = LoanRequest {
            member_id: credential.member_id.clone(),
            account_id: account.id_account.clone(),
            principal: total_bill,
            total_amount: amount,
            is_merchant: false,
            interest_rate,
            loan_product_id,
            destination_account: desa.no_rekening.clone(),
        };
        self.ledger.create_loan(token, &loan).await?;
        info!(
            request_id = %ctx.request_id,
            user_id = %user.id,
            "paylater loan created principal={} amount={}",
            loan.principal, loan.total_amount
        );

        let order = paylater_order(user, desa, total_bill, payment_fee, now, &self.policy);

        if let Err(err) = self.ratchet_tier(user.id, total_bill, now).await {
            error!(
                target: "reconciliation",
                request_id = %ctx.request_id,
                user_id = %user.id,
                order_id = %order.id,
                amount = %total_bill,
                "paylater loan issued but tier update failed: {err}"
            );
        }

        Ok(order)
    }

    async fn ratchet_tier(
        &self,
        id_user: Uuid,
        new_total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let MonthUsage { window, total, .. } =
            month_usage(self.orders.as_ref(), &self.policy, id_user, now).await?;
        let (mut flag, _) = ensure_flag(self.users.as_ref(), id_user, &window, now).await?;

        for _ in 0..MAX_TIER_ATTEMPTS {
            let surcharge = self.policy.compute_surcharge(total, new_total, flag.tier);
            if surcharge.tier_after == flag.tier {
                return Ok(());
            }
            if self.users.bump_flag_tier(flag.id, flag.tier).await? {
                return Ok(());
            }

            flag = self
                .users
                .find_flag(id_user, window.start)
                .await?
                .ok_or_else(|| ServiceError::Internal("paylater flag vanished".to_string()))?;
        }

        Err(ServiceError::Internal(format!(
            "tier update lost {MAX_TIER_ATTEMPTS} races"
        )))
    }

    pub async fn pay_paylater_bill(&self, ctx: &RequestContext) -> Result<Order, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;

        let bill = self.ledger.outstanding_bill(&credential).await?;
        if bill.as_ref().is_none_or(|items| items.is_empty()) {
            return Err(ServiceError::not_found("TAGIHAN NOT FOUND"));
        }

        let unpaid = self.orders.find_unpaid_paylater(user.id).await?;
        let mut totals = BillTotals::default();
        for order in &unpaid {
            totals.add(order);
        }

        let now = Utc::now();
        let number_order = unique_order_number(
            self.orders.as_ref(),
            BILL_NUMBER_PREFIX,
            now,
            self.policy.utc_offset,
        )
        .await?;
        let settlement = settlement_order(&user, number_order, &totals, now);

        self.ledger.settle_bill(&credential).await?;

        match self.orders.record_bill_settlement(user.id, &settlement).await {
            Ok(marked) => {
                info!(
                    request_id = %ctx.request_id,
                    user_id = %user.id,
                    "paylater bill settled as {} covering {marked} orders",
                    settlement.number_order
                );
                Ok(settlement)
            }
            Err(err) => {
                error!(
                    target: "reconciliation",
                    request_id = %ctx.request_id,
                    user_id = %user.id,
                    number_order = %settlement.number_order,
                    amount = %totals.total_bill,
                    orders = unpaid.len(),
                    "ledger bill settled but local settlement rolled back: {err:#}"
                );
                Err(err.into())
            }
        }
    }

    // Marks the oldest unpaid order, whichever loan id was given.
    pub async fn debet_per_transaksi(
        &self,
        ctx: &RequestContext,
        loan_id: &str,
    ) -> Result<Order, ServiceError> {
        let loan_id = loan_id.trim();
        if loan_id.is_empty() {
            return Err(ServiceError::bad_request("loan_id is required"));
        }

        let user = load_user(self.users.as_ref(), ctx).await?;
        let credential = require_credential(&user)?;
        let mut order = self
            .orders
            .find_oldest_unpaid_paylater(user.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order not found"))?;

        self.ledger
            .debit_installment(&credential.access_token, loan_id)
            .await?;

        match self.orders.mark_paylater_paid(order.id).await {
            Ok(true) => {
                info!(
                    request_id = %ctx.request_id,
                    user_id = %user.id,
                    loan_id,
                    "installment debited for order {}",
                    order.number_order
                );
                order.paylater_paid = true;
                Ok(order)
            }
            Ok(false) => {
                error!(
                    target: "reconciliation",
                    request_id = %ctx.request_id,
                    user_id = %user.id,
                    loan_id,
                    order_id = %order.id,
                    "installment debited but order was already settled"
                );
                Err(ServiceError::Internal(format!(
                    "order {} changed during debit",
                    order.id
                )))
            }
            Err(err) => {
                error!(
                    target: "reconciliation",
                    request_id = %ctx.request_id,
                    user_id = %user.id,
                    loan_id,
                    order_id = %order.id,
                    "installment debited but order was not marked paid: {err:#}"
                );
                Err(err.into())
            }
        }
    }
}

#[derive(Debug, Default)]
struct BillTotals {
    payment_cash: Decimal,
    payment_fee: Decimal,
    total_bill: Decimal,
    sub_total: Decimal,
}

impl BillTotals {
    fn add(&mut self, order: &Order) {
        self.payment_cash += order.payment_cash;
        self.payment_fee += order.payment_fee;
        self.total_bill += order.total_bill;
        self.sub_total += order.sub_total;
    }
}

fn paylater_order(
    user: &User,
    desa: &DesaContext,
    total_bill: Decimal,
    payment_fee: Decimal,
    now: DateTime<Utc>,
    policy: &PaylaterPolicy,
) -> Order {
    let amount = total_bill + payment_fee;
    Order {
        id: Uuid::new_v4(),
        id_user: user.id,
        id_desa: Some(desa.id_desa),
        number_order: String::new(),
        product_type: PRODUCT_TYPE_PRODUCT.to_string(),
        order_type: ORDER_TYPE_PURCHASE,
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        shipping_cost: Decimal::ZERO,
        payment_cash: amount,
        payment_fee,
        sub_total: total_bill,
        total_bill: amount,
        payment_method: PaymentMethod::Paylater,
        payment_channel: PaymentMethod::Paylater.as_str().to_string(),
        payment_name: PaymentMethod::Paylater.display_name().to_string(),
        payment_status: PaymentStatus::Paid,
        order_status: OrderStatus::Processed,
        paylater_paid: false,
        ordered_at: now,
        payment_due_at: Some(policy.due_date(now)),
        payment_success_at: Some(now),
        completed_at: None,
        canceled_at: None,
    }
}

fn settlement_order(
    user: &User,
    number_order: String,
    totals: &BillTotals,
    now: DateTime<Utc>,
) -> Order {
    Order {
        id: Uuid::new_v4(),
        id_user: user.id,
        id_desa: user.id_desa,
        number_order,
        product_type: PRODUCT_TYPE_PAYMENT.to_string(),
        order_type: ORDER_TYPE_PAYLATER_SETTLEMENT,
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        shipping_cost: Decimal::ZERO,
        payment_cash: totals.payment_cash,
        payment_fee: totals.payment_fee,
        sub_total: totals.sub_total,
        total_bill: totals.total_bill,
        payment_method: PaymentMethod::TabunganBima,
        payment_channel: PaymentMethod::TabunganBima.as_str().to_string(),
        payment_name: PaymentMethod::TabunganBima.display_name().to_string(),
        payment_status: PaymentStatus::Paid,
        order_status: OrderStatus::Completed,
        paylater_paid: false,
        ordered_at: now,
        payment_due_at: None,
        payment_success_at: Some(now),
        completed_at: Some(now),
        canceled_at: None,
    }
}

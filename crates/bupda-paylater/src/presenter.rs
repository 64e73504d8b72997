use std::sync::Arc;

use bupda_core::{
    OrderStore, PaylaterPolicy, PaymentChannelStore, PaymentMethod, ServiceError, UserStore,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::context::{RequestContext, load_user};
use crate::usage::{ensure_flag, month_usage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelQuote {
    pub code: String,
    pub name: String,
    pub method: PaymentMethod,
    pub fee: Decimal,
    pub total_payment: Decimal,
    pub available: bool,
}

#[derive(Clone)]
pub struct PaymentChannelPresenter {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    channels: Arc<dyn PaymentChannelStore>,
    policy: PaylaterPolicy,
}

impl PaymentChannelPresenter {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        users: Arc<dyn UserStore>,
        channels: Arc<dyn PaymentChannelStore>,
        policy: PaylaterPolicy,
    ) -> Self {
        Self {
            orders,
            users,
            channels,
            policy,
        }
    }

    // Creates the month's tier-1 flag when none exists; never bumps the tier.
    pub async fn paylater_surcharge(
        &self,
        ctx: &RequestContext,
        total_bill: Decimal,
    ) -> Result<Decimal, ServiceError> {
        if total_bill < Decimal::ZERO {
            return Err(ServiceError::bad_request("total_bill must not be negative"));
        }

        let now = Utc::now();
        let usage = month_usage(self.orders.as_ref(), &self.policy, ctx.user_id, now).await?;
        let (flag, created) =
            ensure_flag(self.users.as_ref(), ctx.user_id, &usage.window, now).await?;

        let tier = (!created).then_some(flag.tier);
        Ok(self
            .policy
            .quote_surcharge(usage.total, usage.orders, total_bill, tier))
    }

    pub async fn list_channels(
        &self,
        ctx: &RequestContext,
        total_bill: Decimal,
    ) -> Result<Vec<ChannelQuote>, ServiceError> {
        let user = load_user(self.users.as_ref(), ctx).await?;
        let paylater_active = user.can_use_paylater();

        let mut quotes = Vec::new();
        for channel in self.channels.list_channels().await? {
            if !channel.active {
                continue;
            }

            let (fee, available) = match channel.method {
                PaymentMethod::Paylater if paylater_active => {
                    (self.paylater_surcharge(ctx, total_bill).await?, true)
                }
                PaymentMethod::Paylater => (self.policy.surcharge, false),
                _ => (channel.fee, true),
            };

            quotes.push(ChannelQuote {
                code: channel.code,
                name: channel.name,
                method: channel.method,
                fee,
                total_payment: total_bill + fee,
                available,
            });
        }

        info!(
            request_id = %ctx.request_id,
            user_id = %ctx.user_id,
            "listed {} payment channels",
            quotes.len()
        );
        Ok(quotes)
    }
}

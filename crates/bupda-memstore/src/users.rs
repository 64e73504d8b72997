use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::bail;
use async_trait::async_trait;
use bupda_core::{
    AccountKind, DesaContext, PaylaterFlag, PaymentChannel, PaymentChannelStore, User,
    UserAccount, UserStore,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
    accounts: RwLock<Vec<UserAccount>>,
    desas: RwLock<HashMap<Uuid, DesaContext>>,
    flags: RwLock<Vec<PaylaterFlag>>,
    channels: RwLock<Vec<PaymentChannel>>,
    lose_tier_race: AtomicBool,
    fail_tier_bump: AtomicBool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn insert_account(&self, account: UserAccount) {
        self.accounts.write().await.push(account);
    }

    pub async fn insert_desa(&self, desa: DesaContext) {
        self.desas.write().await.insert(desa.id_desa, desa);
    }

    pub async fn insert_flag(&self, flag: PaylaterFlag) {
        self.flags.write().await.push(flag);
    }

    pub async fn insert_channel(&self, channel: PaymentChannel) {
        self.channels.write().await.push(channel);
    }

    // The next bump finds the tier already raised by a concurrent writer.
    pub fn lose_next_tier_race(&self) {
        self.lose_tier_race.store(true, Ordering::SeqCst);
    }

    pub fn fail_tier_bump(&self, fail: bool) {
        self.fail_tier_bump.store(fail, Ordering::SeqCst);
    }

    pub async fn flags(&self) -> Vec<PaylaterFlag> {
        self.flags.read().await.clone()
    }

    async fn find_account(
        &self,
        id_user: Uuid,
        kind: AccountKind,
    ) -> anyhow::Result<Option<UserAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .iter()
            .find(|account| account.id_user == id_user && account.kind == kind)
            .cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_paylater_account(&self, id_user: Uuid) -> anyhow::Result<Option<UserAccount>> {
        self.find_account(id_user, AccountKind::Paylater).await
    }

    async fn find_savings_account(&self, id_user: Uuid) -> anyhow::Result<Option<UserAccount>> {
        self.find_account(id_user, AccountKind::TabunganBima).await
    }

    async fn find_desa(&self, id_desa: Uuid) -> anyhow::Result<Option<DesaContext>> {
        Ok(self.desas.read().await.get(&id_desa).cloned())
    }

    async fn find_flag(
        &self,
        id_user: Uuid,
        period_start: DateTime<Utc>,
    ) -> anyhow::Result<Option<PaylaterFlag>> {
        let flags = self.flags.read().await;
        Ok(flags
            .iter()
            .find(|flag| flag.id_user == id_user && flag.period_start == period_start)
            .cloned())
    }

    async fn create_flag_if_absent(
        &self,
        flag: &PaylaterFlag,
    ) -> anyhow::Result<(PaylaterFlag, bool)> {
        let mut flags = self.flags.write().await;
        if let Some(existing) = flags
            .iter()
            .find(|row| row.id_user == flag.id_user && row.period_start == flag.period_start)
        {
            return Ok((existing.clone(), false));
        }
        flags.push(flag.clone());
        Ok((flag.clone(), true))
    }

    async fn bump_flag_tier(&self, flag_id: Uuid, expected_tier: i32) -> anyhow::Result<bool> {
        if self.fail_tier_bump.load(Ordering::SeqCst) {
            bail!("user store unavailable");
        }
        let mut flags = self.flags.write().await;
        let Some(flag) = flags.iter_mut().find(|flag| flag.id == flag_id) else {
            bail!("paylater flag {flag_id} not found");
        };
        if self.lose_tier_race.swap(false, Ordering::SeqCst) {
            flag.tier += 1;
        }
        if flag.tier != expected_tier {
            return Ok(false);
        }
        flag.tier = expected_tier + 1;
        Ok(true)
    }
}

#[async_trait]
impl PaymentChannelStore for InMemoryUserStore {
    async fn list_channels(&self) -> anyhow::Result<Vec<PaymentChannel>> {
        Ok(self.channels.read().await.clone())
    }
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use alloy::primitives::{Address, TxHash, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use voter_auth::accounts::UserStore;
use voter_auth::auth::TokenIssuer;
use voter_auth::blockchain::types::{BlockchainResult, ConfirmationStatus};
use voter_auth::blockchain::{BlockchainError, FundingChain, FundingSettings, WalletProvisioner};
use voter_auth::ledger::InMemoryLedger;
use voter_auth::mail::LogMailer;
use voter_auth::services::{ElectionService, InviteService, UserService};
use voter_auth::{AppState, HttpServer, ServiceConfig, Shutdown};

/// A running server plus the handles tests poke at.
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub mailer: LogMailer,
    shutdown: Shutdown,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config(addr: SocketAddr) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = addr.to_string();
    config.auth.bcrypt_cost = 4;
    config.blockchain.funding.base_delay_ms = 10;
    config.blockchain.funding.max_delay_ms = 50;
    config
}

/// Start the API on `addr` with the in-memory ledger and no chain.
pub async fn spawn_app(addr: SocketAddr) -> TestApp {
    spawn_app_with_chain(addr, None).await
}

/// Start the API on `addr`, funding wallets through `chain` when given.
pub async fn spawn_app_with_chain(addr: SocketAddr, chain: Option<Arc<dyn FundingChain>>) -> TestApp {
    let config = test_config(addr);
    let mailer = LogMailer::new();
    let store = UserStore::new(None);
    let tokens = Arc::new(TokenIssuer::new(&config.auth));
    let settings = FundingSettings::from_config(&config.blockchain).unwrap();
    let provisioner = WalletProvisioner::new(chain, settings, 5);

    let users = UserService::new(
        store.clone(),
        tokens.clone(),
        provisioner.clone(),
        Arc::new(mailer.clone()),
        config.auth.bcrypt_cost,
        config.invites.clone(),
    );
    let elections = ElectionService::new(Arc::new(InMemoryLedger::new()), store.clone());
    let invites = InviteService::new(store.clone(), Arc::new(mailer.clone()), config.invites.clone());

    let state = AppState {
        users: Arc::new(users),
        elections: Arc::new(elections),
        invites: Arc::new(invites),
        tokens,
        store,
        provisioner,
        blockchain: None,
        started_at: Instant::now(),
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state, &config);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestApp {
        base: format!("http://{}", addr),
        client,
        mailer,
        shutdown,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (u16, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.expect("server unreachable")).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let req = self.client.put(self.url(path)).bearer_auth(token).json(&body);
        read(req.send().await.expect("server unreachable")).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        read(req.send().await.expect("server unreachable")).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (u16, Value) {
        let req = self.client.delete(self.url(path)).bearer_auth(token);
        read(req.send().await.expect("server unreachable")).await
    }

    /// Sign up and return `(user id, token)`.
    pub async fn sign_up(&self, name: &str, email: &str) -> (u64, String) {
        let (status, body) = self
            .post(
                "/api/auth/sign-up",
                None,
                json!({ "name": name, "email": email, "password": "senha123" }),
            )
            .await;
        assert_eq!(status, 201, "sign-up failed: {body}");
        (
            body["user"]["id"].as_u64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }
}

async fn read(res: reqwest::Response) -> (u16, Value) {
    let status = res.status().as_u16();
    let text = res.text().await.unwrap_or_default();
    let body = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, body)
}

/// In-process chain whose funders hold balances and whose sends can be made
/// to fail a fixed number of times.
#[derive(Default)]
pub struct FlakyChain {
    pub balances: DashMap<Address, U256>,
    pub send_failures: AtomicU32,
    /// Message of the injected send rejections; defaults to a full pool.
    rejection: Option<&'static str>,
    /// Number of balance reads to fail once a transfer has gone out.
    pub read_failures_after_send: AtomicU32,
    /// Delay before each send answers.
    send_delay: Option<Duration>,
    sends: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyChain {
    pub fn with_rejection(mut self, message: &'static str) -> Self {
        self.rejection = Some(message);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn credit(&self, address: Address, wei: U256) {
        *self.balances.entry(address).or_default() += wei;
    }

    pub fn sends(&self) -> u32 {
        self.sends.load(Ordering::SeqCst)
    }

    /// Sends tried, rejected ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FundingChain for FlakyChain {
    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        if self.sends() > 0
            && self
                .read_failures_after_send
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(BlockchainError::Timeout(1));
        }
        Ok(self.balances.get(&address).map(|b| *b).unwrap_or_default())
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        Ok(1)
    }

    async fn estimate_transfer_gas(&self, _: Address, _: Address, _: U256) -> BlockchainResult<u64> {
        Ok(21_000)
    }

    async fn unlock(&self, _: Address, password: &str, _: u64) -> BlockchainResult<bool> {
        Ok(password == "admin")
    }

    async fn send_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
        gas_limit: u64,
    ) -> BlockchainResult<TxHash> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .send_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BlockchainError::Rejected {
                code: -32000,
                message: self.rejection.unwrap_or("txpool is full").into(),
            });
        }
        let have = self.balances.get(&from).map(|b| *b).unwrap_or_default();
        let cost = value + U256::from(gas_limit);
        if have < cost {
            return Err(BlockchainError::Rejected {
                code: -32000,
                message: "insufficient funds for gas * price + value".into(),
            });
        }
        *self.balances.entry(from).or_default() -= cost;
        *self.balances.entry(to).or_default() += value;
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(B256::with_last_byte(n as u8 + 1))
    }

    async fn wait_for_receipt(&self, _: TxHash, _: Duration) -> BlockchainResult<ConfirmationStatus> {
        Ok(ConfirmationStatus::Confirmed { block_number: 1 })
    }
}

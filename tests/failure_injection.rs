//! Failure injection tests for wallet funding.

use alloy::primitives::utils::parse_ether;
use alloy::primitives::Address;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use voter_auth::blockchain::FundingReport;
use voter_auth::ServiceConfig;

mod common;

fn funders() -> Vec<Address> {
    ServiceConfig::default()
        .blockchain
        .funder_addresses
        .iter()
        .map(|a| a.parse().unwrap())
        .collect()
}

#[tokio::test]
async fn test_sign_up_survives_dry_funders() {
    let addr: SocketAddr = "127.0.0.1:28701".parse().unwrap();
    let chain = Arc::new(common::FlakyChain::default());
    let app = common::spawn_app_with_chain(addr, Some(chain.clone())).await;

    let (status, body) = app
        .post(
            "/api/auth/sign-up",
            None,
            json!({ "name": "Ana", "email": "ana@example.com", "password": "senha123" }),
        )
        .await;
    assert_eq!(status, 201, "funding shortfall must not fail sign-up: {body}");
    assert_eq!(body["wallet"]["funded"], false);
    assert!(body["wallet"]["funding_error"].as_str().is_some());
    assert_eq!(chain.sends(), 0);
    let token = body["token"].as_str().unwrap().to_string();

    // Skipped transfers are kept on the wallet record.
    let (_, wallet) = app.get("/api/wallet", Some(&token)).await;
    assert_eq!(wallet["funding"].as_array().unwrap().len(), 2);

    // Once a funder is topped up, a retry brings the wallet to target.
    chain.credit(funders()[1], parse_ether("10").unwrap());
    let (status, body) = app.post("/api/wallet/fund", Some(&token), json!({})).await;
    assert_eq!(status, 200, "{body}");
    let report: FundingReport = serde_json::from_value(body).unwrap();
    assert!(report.is_funded());
    assert_eq!(chain.sends(), 1);

    // Already funded: no further transfers.
    let (status, body) = app.post("/api/wallet/fund", Some(&token), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["transfers"], json!([]));
    assert_eq!(chain.sends(), 1);
}

#[tokio::test]
async fn test_rejected_sends_are_retried() {
    let addr: SocketAddr = "127.0.0.1:28702".parse().unwrap();
    let chain = Arc::new(common::FlakyChain::default());
    chain.credit(funders()[0], parse_ether("10").unwrap());
    chain.send_failures.store(2, Ordering::SeqCst);
    let app = common::spawn_app_with_chain(addr, Some(chain.clone())).await;

    let (status, body) = app
        .post(
            "/api/auth/sign-up",
            None,
            json!({ "name": "Ana", "email": "ana@example.com", "password": "senha123" }),
        )
        .await;
    assert_eq!(status, 201);
    assert_eq!(body["wallet"]["funded"], true, "{body}");
    assert_eq!(chain.sends(), 1);
    assert_eq!(chain.send_failures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_nonce_conflicts_are_not_resent() {
    let addr: SocketAddr = "127.0.0.1:28704".parse().unwrap();
    let chain = Arc::new(common::FlakyChain::default().with_rejection("nonce too low"));
    chain.credit(funders()[0], parse_ether("10").unwrap());
    chain.credit(funders()[1], parse_ether("10").unwrap());
    chain.send_failures.store(1, Ordering::SeqCst);
    let app = common::spawn_app_with_chain(addr, Some(chain.clone())).await;

    let (status, body) = app
        .post(
            "/api/auth/sign-up",
            None,
            json!({ "name": "Ana", "email": "ana@example.com", "password": "senha123" }),
        )
        .await;
    assert_eq!(status, 201);
    // the first funder's send is given up on, the second one covers the wallet
    assert_eq!(body["wallet"]["funded"], true, "{body}");
    assert_eq!(chain.attempts(), 2);
    assert_eq!(chain.sends(), 1);

    let token = body["token"].as_str().unwrap().to_string();
    let (_, wallet) = app.get("/api/wallet", Some(&token)).await;
    let funding = wallet["funding"].as_array().unwrap();
    assert_eq!(funding.len(), 2);
    assert_eq!(funding[0]["outcome"]["status"], "send_failed");
}

#[tokio::test]
async fn test_transfers_survive_a_failed_balance_read() {
    let addr: SocketAddr = "127.0.0.1:28705".parse().unwrap();
    let chain = Arc::new(common::FlakyChain::default());
    chain.credit(funders()[0], parse_ether("10").unwrap());
    chain.read_failures_after_send.store(1, Ordering::SeqCst);
    let app = common::spawn_app_with_chain(addr, Some(chain.clone())).await;

    let (status, body) = app
        .post(
            "/api/auth/sign-up",
            None,
            json!({ "name": "Ana", "email": "ana@example.com", "password": "senha123" }),
        )
        .await;
    assert_eq!(status, 201, "{body}");
    assert_eq!(body["wallet"]["funded"], false);
    assert!(body["wallet"]["funding_error"].as_str().unwrap().contains("stopped after 1"));
    assert_eq!(chain.sends(), 1);

    let token = body["token"].as_str().unwrap().to_string();
    let (status, wallet) = app.get("/api/wallet", Some(&token)).await;
    assert_eq!(status, 200, "{wallet}");
    let funding = wallet["funding"].as_array().unwrap();
    assert_eq!(funding.len(), 1);
    assert!(funding[0]["tx_hash"].as_str().is_some());

    // The transfer landed, so a top-up finds nothing left to send.
    let (status, body) = app.post("/api/wallet/fund", Some(&token), json!({})).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["transfers"], json!([]));
    assert_eq!(chain.sends(), 1);
}

#[tokio::test]
async fn test_racing_sign_ups_fund_one_wallet() {
    let addr: SocketAddr = "127.0.0.1:28706".parse().unwrap();
    let chain = Arc::new(common::FlakyChain::default().with_send_delay(Duration::from_millis(50)));
    chain.credit(funders()[0], parse_ether("10").unwrap());
    let app = common::spawn_app_with_chain(addr, Some(chain.clone())).await;

    let body = json!({ "name": "Ana", "email": "ana@example.com", "password": "senha123" });
    let (first, second) = tokio::join!(
        app.post("/api/auth/sign-up", None, body.clone()),
        app.post("/api/auth/sign-up", None, body.clone()),
    );

    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![201, 409]);
    assert_eq!(chain.sends(), 1);
}

#[tokio::test]
async fn test_concurrent_sign_ups_all_get_funded_wallets() {
    let addr: SocketAddr = "127.0.0.1:28703".parse().unwrap();
    let chain = Arc::new(common::FlakyChain::default());
    chain.credit(funders()[0], parse_ether("100").unwrap());
    let app = Arc::new(common::spawn_app_with_chain(addr, Some(chain.clone())).await);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                app.post(
                    "/api/auth/sign-up",
                    None,
                    json!({ "name": format!("User {i}"), "email": format!("user{i}@example.com"), "password": "senha123" }),
                )
                .await
            })
        })
        .collect();

    let mut wallets = std::collections::HashSet::new();
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, 201);
        assert_eq!(body["wallet"]["funded"], true);
        wallets.insert(body["wallet"]["address"].as_str().unwrap().to_string());
    }
    assert_eq!(wallets.len(), 8);
    assert_eq!(chain.sends(), 8);
}

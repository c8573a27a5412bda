// tests/pipeline_tests.rs
//
// Cross-component tests against mocked HTTP endpoints. The nonce ordering
// test runs a small stateful RPC node on hyper; everything else uses static
// mockito mocks.

use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::{keccak256, rlp::Rlp};
use ethers_signers::LocalWallet;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use mockito::Matcher;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use web3_agent::agent::confirm::Resolution;
use web3_agent::agent::tools::Toolbox;
use web3_agent::chain::client::{BlockTag, ChainClient};
use web3_agent::error::AgentError;
use web3_agent::explorer::{Explorer, VerifyRequest};
use web3_agent::llm::{ChatMessage, LlmClient};
use web3_agent::tx::builder::{TxPayload, TxSubmitter};

const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const RECIPIENT: &str = "0xDA616Cf8f1114dcC4acfb76Efc9b23DCF2DeB54a";

fn chain_client(url: &str) -> Arc<ChainClient> {
    Arc::new(ChainClient::new(url, Duration::from_secs(5)).unwrap())
}

fn submitter(url: &str) -> Arc<TxSubmitter> {
    let wallet = LocalWallet::from_str(TEST_KEY).unwrap();
    Arc::new(TxSubmitter::new(chain_client(url), wallet, 97))
}

// <-------- stateful mock RPC node -------->

struct MockNode {
    // pending transaction count, bumped on every accepted broadcast
    tx_count: AtomicU64,
    // nonces decoded from broadcast raw transactions, in arrival order
    seen_nonces: Mutex<Vec<u64>>,
}

impl MockNode {
    fn handle(&self, body: &Value) -> Value {
        let method = body["method"].as_str().unwrap_or_default();
        let result = match method {
            "eth_getTransactionCount" => {
                // Nonce assignment must see unmined submissions.
                assert_eq!(body["params"][1], "pending");
                json!(format!("0x{:x}", self.tx_count.load(Ordering::SeqCst)))
            }
            "eth_gasPrice" => json!("0xb2d05e00"), // 3 gwei
            "eth_sendRawTransaction" => {
                let raw = body["params"][0].as_str().unwrap_or_default();
                let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
                // Legacy signed tx RLP: [nonce, gasPrice, gas, to, value, data, v, r, s]
                let rlp = Rlp::new(&bytes);
                let nonce: U256 = rlp.val_at(0).unwrap();
                self.seen_nonces.lock().unwrap().push(nonce.as_u64());
                self.tx_count.fetch_add(1, Ordering::SeqCst);
                json!(format!("0x{}", hex::encode(keccak256(&bytes))))
            }
            other => panic!("unexpected RPC method {}", other),
        };
        json!({"jsonrpc": "2.0", "id": body["id"].clone(), "result": result})
    }
}

async fn spawn_mock_node(start_count: u64) -> (String, Arc<MockNode>) {
    let node = Arc::new(MockNode {
        tx_count: AtomicU64::new(start_count),
        seen_nonces: Mutex::new(Vec::new()),
    });

    let state = node.clone();
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let state = state.clone();
                async move {
                    let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
                    let body: Value = serde_json::from_slice(&bytes).unwrap();
                    let reply = state.handle(&body);
                    Ok::<_, Infallible>(Response::new(Body::from(reply.to_string())))
                }
            }))
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let server = Server::bind(&addr).serve(make_svc);
    let url = format!("http://{}", server.local_addr());
    tokio::spawn(server);
    (url, node)
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_submissions_get_strictly_increasing_nonces() {
    let (url, node) = spawn_mock_node(5).await;
    let submitter = submitter(&url);
    let to = Address::from_str(RECIPIENT).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let submitter = submitter.clone();
        tasks.push(tokio::spawn(async move {
            submitter
                .submit(TxPayload::native_transfer(to, U256::exp10(15), 21_000))
                .await
                .unwrap()
        }));
    }
    let mut hashes = Vec::new();
    for task in tasks {
        hashes.push(task.await.unwrap());
    }

    // Four distinct transactions, nonces 5..=8 in broadcast order.
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), 4);
    let nonces = node.seen_nonces.lock().unwrap().clone();
    assert_eq!(nonces, vec![5, 6, 7, 8]);
}

// <-------- static mocks -------->

#[tokio::test]
async fn balance_query_round_trip() {
    let mock = mockito::mock("POST", "/")
        .match_body(Matcher::PartialJsonString(
            r#"{"method": "eth_getBalance"}"#.to_string(),
        ))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x14d1120d7b160000"}"#)
        .create();

    let chain = chain_client(&mockito::server_url());
    let address = Address::from_str("0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7").unwrap();
    let balance = chain.get_balance(address).await.unwrap();
    assert_eq!(balance, U256::from(1_500_000_000_000_000_000u64));
    mock.assert();
}

#[tokio::test]
async fn transaction_count_query_reads_confirmed_state() {
    let mock = mockito::mock("POST", "/")
        .match_body(Matcher::PartialJsonString(
            r#"{"method": "eth_getTransactionCount", "params": ["0xda616cf8f1114dcc4acfb76efc9b23dcf2deb54a", "latest"]}"#
                .to_string(),
        ))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#)
        .create();

    let chain = chain_client(&mockito::server_url());
    let address = Address::from_str(RECIPIENT).unwrap();
    let count = chain
        .get_transaction_count(address, BlockTag::Latest)
        .await
        .unwrap();
    assert_eq!(count, U256::from(42u64));
    mock.assert();
}

#[tokio::test]
async fn node_rejection_is_classified() {
    let mock = mockito::mock("POST", "/")
        .match_body(Matcher::PartialJsonString(
            r#"{"method": "eth_sendRawTransaction"}"#.to_string(),
        ))
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
        )
        .create();

    let chain = chain_client(&mockito::server_url());
    let result = chain
        .send_raw_transaction(vec![0u8, 1, 2].into())
        .await;
    assert!(matches!(result, Err(AgentError::NonceConflict(_))));
    mock.assert();
}

#[tokio::test]
async fn unverified_contract_abi_is_metadata_unavailable() {
    let token = "0x1111111111111111111111111111111111111111";
    let mock = mockito::mock("GET", "/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "getabi".into()),
            Matcher::UrlEncoded("address".into(), token.into()),
        ]))
        .with_body(r#"{"status":"0","message":"NOTOK","result":"Contract source code not verified"}"#)
        .create();

    let explorer = Explorer::new(
        mockito::server_url(),
        "key",
        "https://testnet.bscscan.com",
        97,
        Duration::from_secs(5),
        Duration::from_millis(1),
    )
    .unwrap();
    let result = explorer.abi(Address::from_str(token).unwrap()).await;
    assert!(matches!(result, Err(AgentError::MetadataUnavailable(_))));
    mock.assert();
}

#[tokio::test]
async fn verification_is_retried_once_then_fails() {
    let mock = mockito::mock("POST", "/")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "verifysourcecode".into()),
            Matcher::UrlEncoded("contractname".into(), "RetryToken".into()),
        ]))
        .with_body(r#"{"status":"0","message":"NOTOK","result":"Unable to locate ContractCode"}"#)
        .expect(2)
        .create();

    let explorer = Explorer::new(
        mockito::server_url(),
        "key",
        "https://testnet.bscscan.com",
        97,
        Duration::from_secs(5),
        Duration::from_millis(1),
    )
    .unwrap();
    let request = VerifyRequest {
        contract_address: Address::from_str("0x2222222222222222222222222222222222222222").unwrap(),
        contract_name: "RetryToken",
        source: "contract RetryToken {}",
        compiler_version: "v0.8.29+commit.ab55807c",
        optimization_runs: 200,
    };
    let result = explorer.verify_source(&request).await;
    assert!(matches!(result, Err(AgentError::VerificationFailed(_))));
    mock.assert();
}

#[tokio::test]
async fn unmined_receipt_times_out_without_failing_submission() {
    let _mock = mockito::mock("POST", "/")
        .match_body(Matcher::PartialJsonString(
            r#"{"method": "eth_getTransactionReceipt"}"#.to_string(),
        ))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)
        .create();

    let submitter = submitter(&mockito::server_url());
    let result = submitter
        .await_receipt(H256::from_low_u64_be(7), Duration::from_millis(20))
        .await;
    assert!(matches!(result, Err(AgentError::DeploymentTimeout { .. })));
}

// Nothing listens on this endpoint: any network call made where none is
// expected turns into a transport error and fails the assertions below.
const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

fn offline_toolbox() -> Toolbox {
    let explorer = Arc::new(Explorer::new(
        DEAD_ENDPOINT,
        "key",
        "https://testnet.bscscan.com",
        97,
        Duration::from_millis(200),
        Duration::from_millis(1),
    )
    .unwrap());
    Toolbox::new(
        chain_client(DEAD_ENDPOINT),
        explorer,
        submitter(DEAD_ENDPOINT),
        2_000_000,
        200_000,
        3_000_000,
        Duration::from_secs(1),
    )
}

#[tokio::test]
async fn declined_transfer_never_reaches_the_builder() {
    let toolbox = offline_toolbox();

    // Proposing a native transfer needs no chain I/O; a transport error here
    // would mean something touched the dead endpoint.
    let summary = toolbox
        .execute(
            "transfer_eth",
            &json!({
                "account_1": "0xC9654530E08907D0Ea73E17fa8EF8964129A3dB7",
                "account_2": RECIPIENT,
                "amount": 1.5
            })
            .to_string(),
        )
        .await;
    assert!(summary.starts_with("Transaction Summary"));
    assert!(summary.contains("1.5 ETH"));
    assert!(toolbox.has_pending_confirmation().await);

    assert!(matches!(
        toolbox.resolve_confirmation("no").await,
        Resolution::Declined
    ));
    assert!(!toolbox.has_pending_confirmation().await);
}

#[tokio::test]
async fn invalid_address_fails_before_any_network_call() {
    let toolbox = offline_toolbox();

    let reply = toolbox
        .execute("eth_get_balance", r#"{"account": "not-an-address"}"#)
        .await;
    // The address check fires before the dead endpoint could be touched.
    assert_eq!(reply, "Error: invalid address 'not-an-address'");
}

#[tokio::test]
async fn chat_completion_round_trip() {
    let mock = mockito::mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJsonString(
            r#"{"model": "test-model"}"#.to_string(),
        ))
        .with_body(
            r#"{"choices":[{"message":{"role":"assistant","content":"Current gas price: 3 gwei"}}]}"#,
        )
        .create();

    let llm = LlmClient::new(
        mockito::server_url(),
        secrecy::SecretString::from("key".to_string()),
        "test-model",
        Duration::from_secs(5),
    )
    .unwrap();
    let reply = llm
        .chat(&[ChatMessage::user("what is the gas price?")], &[])
        .await
        .unwrap();
    assert_eq!(reply.content.as_deref(), Some("Current gas price: 3 gwei"));
    mock.assert();
}

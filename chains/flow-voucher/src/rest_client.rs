//! Flow access node client over the REST API
//!
//! [`FlowRestConnector`] builds one [`FlowRestClient`] per key slot. Each
//! client owns its own `reqwest` connection pool, which is dropped on
//! [`close`](VoucherClient::close).
//!
//! # Endpoints
//!
//! | operation | request |
//! |---|---|
//! | `ping` | `GET /v1/blocks?height=sealed` |
//! | `verify_user_signature` | `POST /v1/scripts` |
//! | `submit_batch_mint` | `GET /v1/blocks`, `GET /v1/accounts/{admin}?expand=keys`, `POST /v1/transactions` |
//! | `resolve_batch_mint` | `GET /v1/transaction_results/{id}`, polled until sealed |
//!
//! Envelope signing is delegated to a [`TransactionSigner`]. Without one the
//! client is read-only and `submit_batch_mint` fails with
//! [`ClientError::SignerUnavailable`].

use crate::cadence::{self, EventFields, strip_0x, with_0x};
use crate::client::{ClientConnector, VoucherClient, VoucherMetadata};
use crate::config::VoucherClientConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use core_logic::{RetryConfig, retry_while};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Computation limit attached to batch-mint transactions.
pub const MINT_GAS_LIMIT: u64 = 9999;

const VERIFY_SIGNATURE_SCRIPT: &str = r#"
import Crypto

pub fun main(address: Address, message: String, keyIds: [Int], signatures: [String]): Bool {
    let account = getAccount(address)
    let keyList = Crypto.KeyList()

    var i = 0
    while i < keyIds.length {
        let key = account.keys.get(keyIndex: keyIds[i]) ?? panic("Key index out of range")
        keyList.add(key.publicKey, hashAlgorithm: key.hashAlgorithm, weight: key.weight)
        i = i + 1
    }

    let signatureSet: [Crypto.KeyListSignature] = []
    var j = 0
    while j < signatures.length {
        signatureSet.append(
            Crypto.KeyListSignature(keyIndex: j, signature: signatures[j].decodeHex())
        )
        j = j + 1
    }

    return keyList.verify(signatureSet: signatureSet, signedData: message.decodeHex())
}
"#;

const BATCH_MINT_TRANSACTION: &str = r#"
import NonFungibleToken from NON_FUNGIBLE_TOKEN_ADDRESS
import Voucher from VOUCHER_ADDRESS

transaction(recipients: [Address], landInfoHashes: [String]) {
    let minter: &Voucher.NFTMinter

    prepare(signer: AuthAccount) {
        self.minter = signer.borrow<&Voucher.NFTMinter>(from: Voucher.MinterStoragePath)
            ?? panic("Could not borrow a reference to the voucher minter")
    }

    execute {
        var i = 0
        while i < recipients.length {
            let receiver = getAccount(recipients[i])
                .getCapability(Voucher.CollectionPublicPath)
                .borrow<&{NonFungibleToken.CollectionPublic}>()
                ?? panic("Could not borrow the recipient's voucher collection")
            self.minter.mintNFT(recipient: receiver, landInfoHash: landInfoHashes[i])
            i = i + 1
        }
    }
}
"#;

/// Proposal key of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalKey {
    pub address: String,
    pub key_index: u32,
    pub sequence_number: u64,
}

/// Everything a signer needs to produce the envelope signature.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub script: String,
    /// JSON-Cadence arguments, in order
    pub arguments: Vec<Value>,
    pub reference_block_id: String,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: String,
    pub authorizers: Vec<String>,
}

/// Account key a transaction is signed with.
pub struct SigningKey<'a> {
    pub address: &'a str,
    pub key_index: u32,
    pub private_key_hex: &'a str,
}

/// Produces envelope signatures for mint transactions.
///
/// Flow's canonical envelope encoding and the signature algorithm live
/// behind this trait.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_envelope(
        &self,
        transaction: &UnsignedTransaction,
        key: &SigningKey<'_>,
    ) -> Result<Vec<u8>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct Block {
    header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    keys: Vec<AccountKey>,
}

#[derive(Debug, Deserialize)]
struct AccountKey {
    index: String,
    sequence_number: String,
}

#[derive(Debug, Serialize)]
struct ScriptRequest {
    script: String,
    arguments: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProposalKeyBody {
    address: String,
    key_index: String,
    sequence_number: String,
}

#[derive(Debug, Serialize)]
struct SignatureBody {
    address: String,
    key_index: String,
    signature: String,
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    script: String,
    arguments: Vec<String>,
    reference_block_id: String,
    gas_limit: String,
    payer: String,
    proposal_key: ProposalKeyBody,
    authorizers: Vec<String>,
    payload_signatures: Vec<SignatureBody>,
    envelope_signatures: Vec<SignatureBody>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    status: String,
    #[serde(default)]
    error_message: String,
    #[serde(default)]
    events: Vec<TransactionEvent>,
}

#[derive(Debug, Deserialize)]
struct TransactionEvent {
    #[serde(rename = "type")]
    event_type: String,
    payload: String,
}

/// Connects [`FlowRestClient`]s.
#[derive(Clone)]
pub struct FlowRestConnector {
    request_timeout: Duration,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl Default for FlowRestConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl FlowRestConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }
}

#[async_trait]
impl ClientConnector for FlowRestConnector {
    type Client = FlowRestClient;

    async fn connect(&self, config: VoucherClientConfig) -> Result<FlowRestClient, ClientError> {
        let endpoint = config.access_endpoint();
        let base = Url::parse(&endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        tracing::debug!(
            target: "voucher_pool",
            key_index = config.key_index,
            "Connected REST client to {}",
            base
        );

        Ok(FlowRestClient {
            http: Some(http),
            base,
            config,
            signer: self.signer.clone(),
        })
    }
}

/// Access node client bound to one admin account key.
pub struct FlowRestClient {
    http: Option<reqwest::Client>,
    base: Url,
    config: VoucherClientConfig,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl FlowRestClient {
    fn http(&self) -> Result<&reqwest::Client, ClientError> {
        self.http.as_ref().ok_or(ClientError::Closed {
            key_index: self.config.key_index,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::InvalidEndpoint {
                endpoint: format!("{}{}", self.base, path),
                reason: e.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let response = self.http()?.get(self.url(path)?).query(query).send().await?;
        Self::read_json(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.http()?.post(self.url(path)?).json(body).send().await?;
        Self::read_json(path, response).await
    }

    async fn read_json<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                endpoint: path.to_string(),
                body,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::decode(path, e))
    }

    async fn latest_sealed_block_id(&self) -> Result<String, ClientError> {
        let blocks: Vec<Block> = self.get_json("/v1/blocks", &[("height", "sealed")]).await?;
        blocks
            .into_iter()
            .next()
            .map(|b| b.header.id)
            .ok_or_else(|| ClientError::decode("/v1/blocks", "no sealed block returned"))
    }

    async fn proposal_key(&self) -> Result<ProposalKey, ClientError> {
        let address = strip_0x(&self.config.admin_account_address).to_string();
        let path = format!("/v1/accounts/{}", address);
        let account: Account = self.get_json(&path, &[("expand", "keys")]).await?;

        let key_index = self.config.key_index;
        let key = account
            .keys
            .iter()
            .find(|k| k.index.parse::<u32>().ok() == Some(key_index))
            .ok_or_else(|| {
                ClientError::decode(&path, format!("account has no key {}", key_index))
            })?;
        let sequence_number = key
            .sequence_number
            .parse()
            .map_err(|e| ClientError::decode("sequence_number", e))?;

        Ok(ProposalKey {
            address,
            key_index,
            sequence_number,
        })
    }

    fn batch_mint_script(&self) -> String {
        BATCH_MINT_TRANSACTION
            .replace(
                "NON_FUNGIBLE_TOKEN_ADDRESS",
                &with_0x(&self.config.non_fungible_token_address),
            )
            .replace("VOUCHER_ADDRESS", &with_0x(&self.config.voucher_address))
    }

    async fn sealed_result(&self, transaction_id: &str) -> Result<TransactionResult, ClientError> {
        let path = format!("/v1/transaction_results/{}", transaction_id);
        let result: TransactionResult = self.get_json(&path, &[]).await?;

        match result.status.as_str() {
            "Sealed" => {
                if !result.error_message.is_empty() {
                    return Err(ClientError::Execution {
                        transaction_id: transaction_id.to_string(),
                        message: result.error_message,
                    });
                }
                Ok(result)
            }
            "Expired" => Err(ClientError::Execution {
                transaction_id: transaction_id.to_string(),
                message: "transaction expired".to_string(),
            }),
            status => Err(ClientError::NotSealed {
                transaction_id: transaction_id.to_string(),
                status: status.to_string(),
            }),
        }
    }

    /// Pair `Minted` events with the recipients from `Deposit` events.
    fn decode_vouchers(
        &self,
        events: &[TransactionEvent],
    ) -> Result<Vec<VoucherMetadata>, ClientError> {
        let contract = format!("A.{}.Voucher", strip_0x(&self.config.voucher_address));
        let minted_type = format!("{}.Minted", contract);
        let deposit_type = format!("{}.Deposit", contract);

        let mut minted = Vec::new();
        let mut recipients = HashMap::new();
        for event in events {
            if event.event_type == minted_type {
                let fields = EventFields::decode(&event.payload)?;
                minted.push((fields.u64("id")?, fields.string("hash")?));
            } else if event.event_type == deposit_type {
                let fields = EventFields::decode(&event.payload)?;
                if let Some(to) = fields.optional_address("to")? {
                    recipients.insert(fields.u64("id")?, to);
                }
            }
        }

        Ok(minted
            .into_iter()
            .map(|(token_id, info_hash)| VoucherMetadata {
                token_id,
                info_hash,
                recipient: recipients.remove(&token_id),
            })
            .collect())
    }
}

#[async_trait]
impl VoucherClient for FlowRestClient {
    fn key_index(&self) -> u32 {
        self.config.key_index
    }

    async fn ping(&self) -> Result<(), ClientError> {
        self.latest_sealed_block_id().await.map(|_| ())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        match self.http.take() {
            Some(http) => {
                drop(http);
                Ok(())
            }
            None => Err(ClientError::AlreadyClosed {
                key_index: self.config.key_index,
            }),
        }
    }

    async fn verify_user_signature(
        &self,
        message_hex: &str,
        account_address: &str,
        key_ids: &[u32],
        signatures: &[String],
    ) -> Result<bool, ClientError> {
        if key_ids.is_empty() || key_ids.len() != signatures.len() {
            return Err(ClientError::InvalidArgument(format!(
                "{} key ids for {} signatures",
                key_ids.len(),
                signatures.len()
            )));
        }
        if hex::decode(message_hex).is_err() {
            return Err(ClientError::InvalidArgument(
                "message is not hex encoded".to_string(),
            ));
        }
        if signatures.iter().any(|s| hex::decode(s).is_err()) {
            return Err(ClientError::InvalidArgument(
                "signature is not hex encoded".to_string(),
            ));
        }

        let arguments = [
            cadence::address(account_address),
            cadence::string(message_hex),
            cadence::array(key_ids.iter().map(|&k| cadence::int(k)).collect()),
            cadence::array(signatures.iter().map(|s| cadence::string(s)).collect()),
        ];
        let request = ScriptRequest {
            script: STANDARD.encode(VERIFY_SIGNATURE_SCRIPT),
            arguments: arguments.iter().map(cadence::encode).collect(),
        };

        let encoded: String = self.post_json("/v1/scripts", &request).await?;
        cadence::as_bool(&cadence::decode(&encoded)?)
    }

    async fn submit_batch_mint(
        &self,
        recipients: &[String],
        info_hashes: &[String],
    ) -> Result<String, ClientError> {
        if recipients.is_empty() || recipients.len() != info_hashes.len() {
            return Err(ClientError::InvalidArgument(format!(
                "{} recipients for {} info hashes",
                recipients.len(),
                info_hashes.len()
            )));
        }
        let signer = self.signer.as_ref().ok_or(ClientError::SignerUnavailable)?;

        let reference_block_id = self.latest_sealed_block_id().await?;
        let proposal_key = self.proposal_key().await?;
        let admin = proposal_key.address.clone();

        let transaction = UnsignedTransaction {
            script: self.batch_mint_script(),
            arguments: vec![
                cadence::array(recipients.iter().map(|r| cadence::address(r)).collect()),
                cadence::array(info_hashes.iter().map(|h| cadence::string(h)).collect()),
            ],
            reference_block_id,
            gas_limit: MINT_GAS_LIMIT,
            proposal_key,
            payer: admin.clone(),
            authorizers: vec![admin.clone()],
        };

        let key = SigningKey {
            address: &admin,
            key_index: self.config.key_index,
            private_key_hex: &self.config.private_key_hex,
        };
        let signature = signer.sign_envelope(&transaction, &key).await?;

        let request = TransactionRequest {
            script: STANDARD.encode(&transaction.script),
            arguments: transaction.arguments.iter().map(cadence::encode).collect(),
            reference_block_id: transaction.reference_block_id.clone(),
            gas_limit: transaction.gas_limit.to_string(),
            payer: transaction.payer.clone(),
            proposal_key: ProposalKeyBody {
                address: transaction.proposal_key.address.clone(),
                key_index: transaction.proposal_key.key_index.to_string(),
                sequence_number: transaction.proposal_key.sequence_number.to_string(),
            },
            authorizers: transaction.authorizers.clone(),
            payload_signatures: Vec::new(),
            envelope_signatures: vec![SignatureBody {
                address: admin,
                key_index: self.config.key_index.to_string(),
                signature: STANDARD.encode(signature),
            }],
        };

        let response: TransactionResponse = self.post_json("/v1/transactions", &request).await?;
        tracing::info!(
            target: "voucher_pool",
            key_index = self.config.key_index,
            "Submitted batch mint of {} vouchers: {}",
            recipients.len(),
            response.id
        );
        Ok(response.id)
    }

    async fn resolve_batch_mint(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<VoucherMetadata>, ClientError> {
        if transaction_id.is_empty() {
            return Err(ClientError::InvalidArgument(
                "empty transaction id".to_string(),
            ));
        }

        let polling = RetryConfig::polling(
            self.config.wait_for_seal_tries,
            self.config.seal_poll_interval_ms,
        );
        let result = retry_while(
            &polling,
            "resolve_batch_mint",
            || self.sealed_result(transaction_id),
            |e| matches!(e, ClientError::NotSealed { .. }),
        )
        .await?;

        self.decode_vouchers(&result.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    const VOUCHER: &str = "01cf0e2f2f715450";

    fn client_config(server: &ServerGuard, key_index: u32) -> VoucherClientConfig {
        let (host, port) = server
            .host_with_port()
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.parse::<u16>().unwrap()))
            .unwrap();
        let config: VoucherClientConfig = toml::from_str(&format!(
            r#"
            host = "{host}"
            port = {port}
            private_key_hex = "00ff"
            voucher_address = "0x{VOUCHER}"
            non_fungible_token_address = "f8d6e0586b0a20c7"
            admin_account_address = "0x{VOUCHER}"
            wait_for_seal_tries = 3
            seal_poll_interval_ms = 10
            "#
        ))
        .unwrap();
        config.with_key_index(key_index)
    }

    async fn connect(server: &ServerGuard, connector: FlowRestConnector) -> FlowRestClient {
        connector.connect(client_config(server, 3)).await.unwrap()
    }

    fn event(kind: &str, fields: Value) -> Value {
        json!({
            "type": format!("A.{}.Voucher.{}", VOUCHER, kind),
            "transaction_id": "tx1",
            "payload": cadence::encode(&json!({
                "type": "Event",
                "value": { "id": format!("A.{}.Voucher.{}", VOUCHER, kind), "fields": fields }
            })),
        })
    }

    struct FixedSigner;

    #[async_trait]
    impl TransactionSigner for FixedSigner {
        async fn sign_envelope(
            &self,
            transaction: &UnsignedTransaction,
            key: &SigningKey<'_>,
        ) -> Result<Vec<u8>, ClientError> {
            assert_eq!(transaction.proposal_key.sequence_number, 7);
            assert_eq!(key.key_index, 3);
            assert_eq!(key.private_key_hex, "00ff");
            Ok(vec![0xAB; 64])
        }
    }

    #[tokio::test]
    async fn test_ping_hits_sealed_block() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/blocks")
            .match_query(Matcher::UrlEncoded("height".into(), "sealed".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"header":{"id":"abc","height":"10"}}]"#)
            .create_async()
            .await;

        let client = connect(&server, FlowRestConnector::default()).await;
        assert!(client.ping().await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ping_reports_http_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/blocks")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let client = connect(&server, FlowRestConnector::default()).await;
        match client.ping().await {
            Err(ClientError::Status { status, body, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "unavailable");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verify_user_signature() {
        let mut server = Server::new_async().await;
        let result = STANDARD.encode(r#"{"type":"Bool","value":true}"#);
        let mock = server
            .mock("POST", "/v1/scripts")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!(result).to_string())
            .create_async()
            .await;

        let client = connect(&server, FlowRestConnector::default()).await;
        let verified = client
            .verify_user_signature("deadbeef", VOUCHER, &[0, 1], &["aa".into(), "bb".into()])
            .await
            .unwrap();
        assert!(verified);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_rejects_mismatched_arguments() {
        let server = Server::new_async().await;
        let client = connect(&server, FlowRestConnector::default()).await;

        let err = client
            .verify_user_signature("deadbeef", VOUCHER, &[0, 1], &["aa".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));

        let err = client
            .verify_user_signature("not hex", VOUCHER, &[0], &["aa".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_resolve_decodes_minted_vouchers() {
        let mut server = Server::new_async().await;
        let body = json!({
            "block_id": "b1",
            "status": "Sealed",
            "status_code": 0,
            "error_message": "",
            "events": [
                event("Minted", json!([
                    { "name": "id", "value": { "type": "UInt64", "value": "11" } },
                    { "name": "hash", "value": { "type": "String", "value": "hash-a" } }
                ])),
                event("Deposit", json!([
                    { "name": "id", "value": { "type": "UInt64", "value": "11" } },
                    { "name": "to", "value": { "type": "Optional", "value": { "type": "Address", "value": "0xf8d6e0586b0a20c7" } } }
                ])),
                event("Minted", json!([
                    { "name": "id", "value": { "type": "UInt64", "value": "12" } },
                    { "name": "hash", "value": { "type": "String", "value": "hash-b" } }
                ])),
                {
                    "type": "A.f8d6e0586b0a20c7.Other.Minted",
                    "payload": "not even base64"
                }
            ]
        });
        server
            .mock("GET", "/v1/transaction_results/tx1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = connect(&server, FlowRestConnector::default()).await;
        let vouchers = client.resolve_batch_mint("tx1").await.unwrap();
        assert_eq!(
            vouchers,
            vec![
                VoucherMetadata {
                    token_id: 11,
                    info_hash: "hash-a".to_string(),
                    recipient: Some("0xf8d6e0586b0a20c7".to_string()),
                },
                VoucherMetadata {
                    token_id: 12,
                    info_hash: "hash-b".to_string(),
                    recipient: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_reports_execution_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/transaction_results/tx2")
            .with_status(200)
            .with_body(r#"{"status":"Sealed","status_code":1,"error_message":"panic: no minter","events":[]}"#)
            .create_async()
            .await;

        let client = connect(&server, FlowRestConnector::default()).await;
        match client.resolve_batch_mint("tx2").await {
            Err(ClientError::Execution { message, .. }) => assert_eq!(message, "panic: no minter"),
            other => panic!("Expected Execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_gives_up_after_seal_tries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/transaction_results/tx3")
            .with_status(200)
            .with_body(r#"{"status":"Pending","events":[]}"#)
            .expect(3)
            .create_async()
            .await;

        let client = connect(&server, FlowRestConnector::default()).await;
        let err = client.resolve_batch_mint("tx3").await.unwrap_err();
        assert!(matches!(err, ClientError::NotSealed { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_requires_signer() {
        let server = Server::new_async().await;
        let client = connect(&server, FlowRestConnector::default()).await;

        let err = client
            .submit_batch_mint(&[VOUCHER.to_string()], &["hash".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::SignerUnavailable));
    }

    #[tokio::test]
    async fn test_submit_signs_with_slot_key() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v1/blocks")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"header":{"id":"ref-block","height":"10"}}]"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("/v1/accounts/{}", VOUCHER).as_str())
            .match_query(Matcher::UrlEncoded("expand".into(), "keys".into()))
            .with_status(200)
            .with_body(
                json!({
                    "address": VOUCHER,
                    "keys": [
                        { "index": "0", "sequence_number": "100" },
                        { "index": "3", "sequence_number": "7" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/v1/transactions")
            .match_body(Matcher::PartialJson(json!({
                "reference_block_id": "ref-block",
                "proposal_key": { "key_index": "3", "sequence_number": "7" },
                "envelope_signatures": [{ "key_index": "3" }]
            })))
            .with_status(200)
            .with_body(r#"{"id":"tx-new"}"#)
            .create_async()
            .await;

        let connector = FlowRestConnector::default().with_signer(Arc::new(FixedSigner));
        let client = connect(&server, connector).await;
        let id = client
            .submit_batch_mint(&["0xf8d6e0586b0a20c7".to_string()], &["hash".to_string()])
            .await
            .unwrap();

        assert_eq!(id, "tx-new");
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_close_is_not_silently_repeated() {
        let server = Server::new_async().await;
        let mut client = connect(&server, FlowRestConnector::default()).await;

        assert!(client.close().await.is_ok());
        assert!(matches!(
            client.close().await,
            Err(ClientError::AlreadyClosed { key_index: 3 })
        ));
        assert!(matches!(
            client.ping().await,
            Err(ClientError::Closed { key_index: 3 })
        ));
    }
}

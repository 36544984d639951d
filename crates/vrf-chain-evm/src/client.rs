//! The client-chain (EVM) reader/writer used by the pipeline engine and poller.

use crate::config::EvmChainConfig;
use crate::contracts::{Bridge, VRFLens, VRFProvider};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy_provider::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer as _;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport::TransportError;
use alloy_transport_http::Http;
use std::num::NonZeroUsize;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::{debug, warn};
use vrf_types::{DuplicateValidator, Task, ValidatorPowerMap};

/// Polling interval for [`EvmClient::receipt_status`].
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Combined filler stack: gas, blob gas, nonce, chain ID.
pub type InnerFiller =
    JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>;

pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

#[derive(Debug, thiserror::Error)]
pub enum EvmClientError {
    /// Network/RPC failure that is worth retrying (`spec.md` §7, "Transient").
    #[error("transient EVM transport error: {0}")]
    Transient(#[from] TransportError),

    /// The receipt never arrived within the configured timeout.
    #[error("timed out waiting for transaction {0} to be mined")]
    ReceiptTimeout(TxHash),

    /// The chain rejected a submitted transaction (`spec.md` §7, "OnChainRevert").
    #[error("on-chain revert: {0}")]
    OnChainRevert(String),

    /// A contract response could not be decoded into the expected shape.
    #[error("failed to decode contract response: {0}")]
    Decode(String),

    /// The Bridge contract reported the same validator address twice.
    #[error(transparent)]
    DuplicateValidator(#[from] DuplicateValidator),

    /// No signer configured.
    #[error("at least one signer must be configured")]
    NoSigners,
}

/// Client-chain access: task reads via `VRFLens`, validator power via `Bridge`,
/// and proof submission via `VRFProvider`.
#[derive(Debug)]
pub struct EvmClient {
    inner: InnerProvider,
    vrf_provider: Address,
    vrf_lens: Address,
    bridge: Address,
    eip1559: bool,
    receipt_timeout: Duration,
    confirmations: u64,
    worker_address: Address,
}

impl EvmClient {
    pub async fn from_config(config: &EvmChainConfig) -> Result<Self, EvmClientError> {
        let signers = config
            .signers
            .iter()
            .map(|s| PrivateKeySigner::from_bytes(s.inner().as_bytes().into()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EvmClientError::Decode(e.to_string()))?;
        let mut signers = signers.into_iter();
        let first = signers.next().ok_or(EvmClientError::NoSigners)?;
        let worker_address = first.address();
        let mut wallet = EthereumWallet::from(first);
        for signer in signers {
            wallet.register_signer(signer);
        }

        let transports = config
            .rpc
            .iter()
            .map(|rpc| {
                let rate_limit = rpc.rate_limit.unwrap_or(u32::MAX);
                ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(rpc.http.clone()))
            })
            .collect::<Vec<_>>();
        let active = NonZeroUsize::new(transports.len())
            .ok_or_else(|| EvmClientError::Decode("at least one RPC endpoint required".into()))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        let client = RpcClient::new(fallback, false);

        let inner: InnerProvider = ProviderBuilder::default()
            .filler(JoinFill::new(
                GasFiller,
                JoinFill::new(
                    BlobGasFiller::default(),
                    JoinFill::new(NonceFiller::default(), ChainIdFiller::default()),
                ),
            ))
            .wallet(wallet)
            .connect_client(client);

        Ok(Self {
            inner,
            vrf_provider: config.vrf_provider,
            vrf_lens: config.vrf_lens,
            bridge: config.bridge,
            eip1559: config.eip1559,
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            confirmations: config.confirmations,
            worker_address,
        })
    }

    /// The worker's own client-chain address, derived from the first configured
    /// signer — carried to the oracle chain as part of `MsgRequestData`.
    pub fn worker_address(&self) -> Address {
        self.worker_address
    }

    /// The highest nonce the `VRFProvider` has assigned so far (`spec.md` §4.1, §4.4).
    pub async fn current_task_nonce(&self) -> Result<u64, EvmClientError> {
        let contract = VRFProvider::new(self.vrf_provider, &self.inner);
        Ok(contract.taskNonce().call().await?)
    }

    /// The oracle script ID this deployment requests data from.
    pub async fn oracle_script_id(&self) -> Result<u64, EvmClientError> {
        let contract = VRFProvider::new(self.vrf_provider, &self.inner);
        Ok(contract.oracleScriptID().call().await?)
    }

    /// Bulk-reads tasks for the given nonces via `VRFLens`, preserving order.
    pub async fn tasks(&self, nonces: &[u64]) -> Result<Vec<Task>, EvmClientError> {
        if nonces.is_empty() {
            return Ok(Vec::new());
        }
        let contract = VRFLens::new(self.vrf_lens, &self.inner);
        let raw = contract.getTasksBulk(nonces.to_vec()).call().await?;
        if raw.len() != nonces.len() {
            return Err(EvmClientError::Decode(format!(
                "expected {} tasks, got {}",
                nonces.len(),
                raw.len()
            )));
        }
        Ok(raw
            .into_iter()
            .zip(nonces)
            .map(|(t, &nonce)| Task {
                nonce,
                is_resolved: t.isResolved,
                time: t.time,
                caller: t.caller,
                task_fee: t.taskFee,
                seed: t.seed,
                client_seed: Bytes::from(t.clientSeed.to_vec()),
                result: t.result,
            })
            .collect())
    }

    /// The encoded oracle-chain ID used in the vote-signing digest (`spec.md` §4.3).
    pub async fn encoded_band_chain_id(&self) -> Result<Bytes, EvmClientError> {
        let contract = Bridge::new(self.bridge, &self.inner);
        let raw = contract.encodedChainID().call().await?;
        Ok(Bytes::from(raw.to_vec()))
    }

    /// The current validator power set from the `Bridge` contract.
    pub async fn validator_powers(&self) -> Result<ValidatorPowerMap, EvmClientError> {
        let contract = Bridge::new(self.bridge, &self.inner);
        let raw = contract.getAllValidatorPowers().call().await?;
        let pairs = raw.into_iter().map(|v| (v.addr, v.power));
        Ok(ValidatorPowerMap::try_from_pairs(pairs)?)
    }

    /// Broadcasts a trimmed proof for `nonce`, returning the transaction hash
    /// once it has been accepted into the mempool (`spec.md` §4.1). Does not
    /// wait for a receipt — call [`EvmClient::receipt_status`] for that.
    ///
    /// `legacy_gas` forces an explicit `gasPrice` fetch rather than relying on
    /// the EIP-1559 filler stack, for chains that advertise support but behave
    /// inconsistently under load.
    pub async fn relay_proof(
        &self,
        proof: Bytes,
        nonce: u64,
        legacy_gas: bool,
    ) -> Result<TxHash, EvmClientError> {
        let contract = VRFProvider::new(self.vrf_provider, &self.inner);
        let calldata = contract.relayProof(proof, nonce).calldata().clone();
        let mut txr = TransactionRequest::default()
            .with_to(self.vrf_provider)
            .with_input(calldata.clone());

        if !self.eip1559 || legacy_gas {
            let gas_price = self.inner.get_gas_price().await?;
            txr.set_gas_price(gas_price);
        }

        // This estimate is the fork/idempotence probe (`spec.md` §4.1, §4.5):
        // a node that reverts here means either the task was already resolved
        // by another actor, or the on-chain task diverged from our snapshot.
        // Either way it is a logical signal, not a transient transport error.
        if let Err(err) = self.inner.estimate_gas(txr.clone()).await {
            return Err(EvmClientError::OnChainRevert(format!(
                "relayProof gas estimation reverted for nonce {nonce}: {err}"
            )));
        }

        debug!(nonce, calldata = %hex::encode(&calldata), "broadcasting relayProof");
        let pending = self.inner.send_transaction(txr).await?;
        let tx_hash = *pending.tx_hash();
        debug!(nonce, tx_hash = %tx_hash, "relayProof broadcast accepted");
        Ok(tx_hash)
    }

    /// The client chain's current block height, used by the fork sweep (`spec.md` §4.6)
    /// to decide which resolved records are old enough to confirm.
    pub async fn current_block_number(&self) -> Result<u64, EvmClientError> {
        Ok(self.inner.get_block_number().await?)
    }

    /// Blocks until `tx_hash` is mined (and, once mined, until `confirmations`
    /// further blocks have landed on top of it), returning its status as
    /// `{0, 1}` per `spec.md` §4.1.
    pub async fn receipt_status(&self, tx_hash: TxHash) -> Result<u8, EvmClientError> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        let receipt = loop {
            if let Some(receipt) = self.inner.get_transaction_receipt(tx_hash).await? {
                break receipt;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EvmClientError::ReceiptTimeout(tx_hash));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        };

        if self.confirmations > 1 {
            if let Some(receipt_block) = receipt.block_number {
                loop {
                    let head = self.inner.get_block_number().await?;
                    if head.saturating_sub(receipt_block) + 1 >= self.confirmations {
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        warn!(tx_hash = %tx_hash, "confirmations wait timed out, returning mined status anyway");
                        break;
                    }
                    tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
                }
            }
        }

        Ok(receipt.status() as u8)
    }
}

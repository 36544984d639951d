//! The oracle-chain client: `request_vrf`, `get_transaction`, `evm_proof`
//! (`spec.md` §4.2).

use crate::config::BandChainConfig;
use crate::obi;
use crate::proto::oracle_query_client::OracleQueryClient;
use crate::proto::{
    AuthInfo, BroadcastTxRequest, Coin, Fee, GetAccountRequest, GetBlockByHeightRequest,
    GetNodeInfoRequest, GetTxRequest, MsgRequestData, QueryProofRequest, ResolveStatus,
    SignDoc, SignerInfo, TxBody, TxRaw, TxResponse,
};
use crate::wallet::Wallet;
use alloy_primitives::B256;
use prost::Message;
use std::time::Duration;
use tokio::time::sleep;
use tonic::transport::Channel;
use tonic::Code;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("transient oracle transport error: {0}")]
    Transient(#[from] tonic::Status),

    #[error("oracle account not found for address {0}")]
    AccountNotFound(String),

    #[error("broadcasting MsgRequestData failed with code {code}: {raw_log}")]
    BroadcastFailed { code: i64, raw_log: String },

    #[error("transaction {0} not found after timeout")]
    NotFound(String),

    #[error("oracle request id {request_id} was rejected: {status:?}")]
    OracleRejected { request_id: u64, status: RejectedStatus },

    #[error("timed out waiting for oracle proof for request id {0}")]
    OracleTimeout(u64),

    #[error("request id not found in transaction events")]
    RequestIdMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedStatus {
    Failure,
    Expired,
}

/// gRPC client against the oracle chain's account/tx/proof/block surface.
#[derive(Debug, Clone)]
pub struct OracleClient {
    inner: OracleQueryClient<Channel>,
    config: BandChainConfig,
}

impl OracleClient {
    pub async fn connect(config: BandChainConfig) -> Result<Self, OracleError> {
        let inner = OracleQueryClient::connect(config.grpc_endpoint.clone())
            .await
            .map_err(|e| OracleError::Transient(tonic::Status::unavailable(e.to_string())))?;
        Ok(Self { inner, config })
    }

    /// Submits a `MsgRequestData` carrying the task's seed, time, and the
    /// worker's client-chain address, broadcast in synchronous mode.
    pub async fn request_vrf(
        &mut self,
        oracle_script_id: u64,
        worker_address: &[u8],
        seed: &[u8],
        time: u64,
        wallet: &Wallet,
    ) -> Result<TxResponse, OracleError> {
        let account = self
            .inner
            .get_account(GetAccountRequest {
                address: wallet.address().to_string(),
            })
            .await
            .map_err(|e| {
                if e.code() == Code::NotFound {
                    OracleError::AccountNotFound(wallet.address().to_string())
                } else {
                    OracleError::Transient(e)
                }
            })?
            .into_inner();

        let node_info = self
            .inner
            .get_node_info(GetNodeInfoRequest {})
            .await?
            .into_inner();

        let calldata = obi::encode_request(seed, time, worker_address);
        debug!(calldata = %hex::encode(&calldata), "encoded MsgRequestData calldata");
        let msg = MsgRequestData {
            oracle_script_id,
            calldata,
            ask_count: self.config.ask_count,
            min_count: self.config.min_count,
            client_id: "vrf_worker".to_string(),
            prepare_gas: self.config.prepare_gas,
            execute_gas: self.config.execute_gas,
            sender: wallet.address().to_string(),
            fee_limit: vec![Coin {
                denom: "uband".to_string(),
                amount: self.config.ds_fee_limit.to_string(),
            }],
        };

        let body = TxBody {
            request_data_msg: msg.encode_to_vec(),
            memo: String::new(),
        };
        let auth_info = AuthInfo {
            signer_info: Some(SignerInfo {
                public_key: wallet.public_key_bytes(),
                sequence: account.sequence,
            }),
            fee: Some(Fee {
                amount: vec![Coin {
                    denom: "uband".to_string(),
                    amount: gas_fee_uband(self.config.gas_limit, self.config.gas_price),
                }],
                gas_limit: self.config.gas_limit,
            }),
        };

        let body_bytes = body.encode_to_vec();
        let auth_info_bytes = auth_info.encode_to_vec();
        let sign_doc = SignDoc {
            body_bytes: body_bytes.clone(),
            auth_info_bytes: auth_info_bytes.clone(),
            chain_id: node_info.chain_id,
            account_number: account.account_number,
        };
        let signature = wallet.sign(&sign_doc.encode_to_vec());

        let tx_raw = TxRaw {
            body_bytes,
            auth_info_bytes,
            signature,
        };

        let response = self
            .inner
            .broadcast_tx(BroadcastTxRequest {
                tx_bytes: tx_raw.encode_to_vec(),
            })
            .await?
            .into_inner();

        let tx_response = response
            .tx_response
            .ok_or_else(|| OracleError::Transient(tonic::Status::internal("empty broadcast response")))?;

        if tx_response.code != 0 {
            return Err(OracleError::BroadcastFailed {
                code: tx_response.code,
                raw_log: tx_response.raw_log,
            });
        }
        debug!(txhash = %tx_response.txhash, "MsgRequestData broadcast accepted");
        Ok(tx_response)
    }

    /// Polls for a broadcast transaction to be indexed, 1s interval.
    pub async fn get_transaction(
        &mut self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<TxResponse, OracleError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self
                .inner
                .get_tx(GetTxRequest {
                    hash: tx_hash.to_string(),
                })
                .await
            {
                Ok(resp) => {
                    if let Some(tx_response) = resp.into_inner().tx_response {
                        return Ok(tx_response);
                    }
                }
                Err(status) if status.code() == Code::NotFound => {}
                Err(status) => return Err(OracleError::Transient(status)),
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(tx_hash, "transaction not indexed within timeout");
                return Err(OracleError::NotFound(tx_hash.to_string()));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// The central resolution-polling loop (`spec.md` §4.2).
    ///
    /// Reads the proof at the resolution height plus one, since validator
    /// signatures for block `N` are carried in the commit included in block
    /// `N+1` — fetching at `version` alone yields an incomplete signature set.
    pub async fn evm_proof(
        &mut self,
        request_id: u64,
        timeout: Duration,
    ) -> Result<(Vec<u8>, B256), OracleError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(OracleError::OracleTimeout(request_id));
            }
            sleep(POLL_INTERVAL).await;

            let proof = match self
                .inner
                .proof(QueryProofRequest {
                    request_id,
                    height: 0,
                })
                .await
            {
                Ok(resp) => resp.into_inner(),
                Err(status) if status.code() == Code::Unknown => continue,
                Err(status) => return Err(OracleError::Transient(status)),
            };

            match ResolveStatus::try_from(proof.resolve_status)
                .unwrap_or(ResolveStatus::OpenUnspecified)
            {
                ResolveStatus::OpenUnspecified => continue,
                ResolveStatus::Failure => {
                    return Err(OracleError::OracleRejected {
                        request_id,
                        status: RejectedStatus::Failure,
                    });
                }
                ResolveStatus::Expired => {
                    return Err(OracleError::OracleRejected {
                        request_id,
                        status: RejectedStatus::Expired,
                    });
                }
                ResolveStatus::Success => {
                    let height = proof.version + 1;

                    let proof_at_height = match self
                        .inner
                        .proof(QueryProofRequest { request_id, height })
                        .await
                    {
                        Ok(resp) => resp.into_inner(),
                        Err(status) if status.code() == Code::Unknown => continue,
                        Err(status) => return Err(OracleError::Transient(status)),
                    };

                    let block = match self
                        .inner
                        .get_block_by_height(GetBlockByHeightRequest {
                            height: height as i64,
                        })
                        .await
                    {
                        Ok(resp) => resp.into_inner(),
                        Err(status) if status.code() == Code::Unknown => continue,
                        Err(status) => return Err(OracleError::Transient(status)),
                    };

                    let block_hash = B256::try_from(block.block_hash.as_slice())
                        .map_err(|_| OracleError::Transient(tonic::Status::internal(
                            "block hash response was not 32 bytes",
                        )))?;

                    return Ok((proof_at_height.evm_proof_bytes, block_hash));
                }
            }
        }
    }
}

/// `gas_limit * gas_price` rounded up, formatted as an integer `uband` amount.
fn gas_fee_uband(gas_limit: u64, gas_price: f64) -> String {
    ((gas_limit as f64) * gas_price).ceil().to_string()
}

/// Scans a transaction response's events for the oracle chain's `request` id
/// attribute (`spec.md` §9, folded in from `original_source/vrf_worker/band/utils.py`).
pub fn find_request_id(tx_response: &TxResponse) -> Option<u64> {
    tx_response
        .events
        .iter()
        .find(|event| event.r#type == "request")
        .and_then(|event| event.attributes.iter().find(|attr| attr.key == "id"))
        .and_then(|attr| attr.value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Attribute, StringEvent};

    fn tx_response_with_events(events: Vec<StringEvent>) -> TxResponse {
        TxResponse {
            txhash: "ABC".to_string(),
            code: 0,
            raw_log: String::new(),
            events,
        }
    }

    #[test]
    fn find_request_id_locates_id_attribute_on_request_event() {
        let tx = tx_response_with_events(vec![StringEvent {
            r#type: "request".to_string(),
            attributes: vec![Attribute {
                key: "id".to_string(),
                value: "42".to_string(),
            }],
        }]);
        assert_eq!(find_request_id(&tx), Some(42));
    }

    #[test]
    fn find_request_id_returns_none_without_a_request_event() {
        let tx = tx_response_with_events(vec![StringEvent {
            r#type: "message".to_string(),
            attributes: vec![],
        }]);
        assert_eq!(find_request_id(&tx), None);
    }

    #[test]
    fn gas_fee_rounds_up_to_whole_uband() {
        assert_eq!(gas_fee_uband(800_000, 0.0025), "2000");
        assert_eq!(gas_fee_uband(100_001, 0.0025), "251");
    }
}

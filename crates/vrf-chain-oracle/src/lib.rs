//! Oracle-chain access: account/tx/proof/block gRPC surface, VRF request
//! submission, transaction-indexing poll, and proof retrieval (`spec.md` §4.2).

pub mod client;
pub mod config;
pub mod obi;
pub mod wallet;

/// Generated gRPC client stubs for the oracle chain's account/tx/proof/block
/// surface (`proto/oracle.proto`). A minimal hand-rolled stand-in for the real
/// multi-service Cosmos-SDK gRPC surface — per `spec.md` §1 the concrete
/// transport is out of scope, only the operations in `client` matter.
pub mod proto {
    tonic::include_proto!("vrfrelay.oracle.v1");
}

pub use client::{find_request_id, OracleClient, OracleError, RejectedStatus};
pub use config::BandChainConfig;
pub use wallet::Wallet;

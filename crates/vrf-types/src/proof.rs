//! Oracle proof shapes shared between the oracle client and the EVM proof trimmer.

use alloy_primitives::{Address, B256, Bytes};

/// The raw proof as handed back by the oracle chain: an opaque relay-data blob and
/// an opaque verify-data blob, both ABI-tuple-encoded on the oracle side.
///
/// Neither field is interpreted by `vrf-types` itself; decoding into [`RelayData`]
/// is the proof trimmer's job (`vrf-chain-evm::trim`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    pub relay_data: Bytes,
    pub verify_data: Bytes,
}

/// The decoded multi-store commitment component of a relay proof: six sibling
/// hashes in the oracle chain's IAVL multi-store tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiStoreData {
    pub oracle_iavl_state_hash: B256,
    pub params_store_merkle_hash: B256,
    pub slashing_to_stake_merkle_hash: B256,
    pub gov_to_main_merkle_hash: B256,
    pub distribution_to_upgrade_merkle_hash: B256,
    pub auth_to_fee_grant_merkle_hash: B256,
}

/// The decoded Tendermint block header merkle parts of a relay proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeaderMerklePartsData {
    pub version_and_chain_id_hash: B256,
    pub height: u64,
    pub time_second: u64,
    pub time_nano_second_fraction: u32,
    pub last_block_id_and_other: B256,
    pub next_validator_hash_and_consensus_hash: B256,
    pub last_results_hash: B256,
    pub evidence_and_proposer_hash: B256,
}

/// The decoded common-encoded-vote-part prefix/suffix that every validator signs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonEncodedVotePartData {
    pub signed_data_prefix: Bytes,
    pub signed_data_suffix: Bytes,
}

/// A single validator signature over the vote, in the shape the relay contract expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmSignature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
    pub encoded_timestamp: Bytes,
}

/// The fully decoded relay proof, prior to validator-set trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayData {
    pub multi_store: MultiStoreData,
    pub merkle_parts: BlockHeaderMerklePartsData,
    pub cevp: CommonEncodedVotePartData,
    pub signatures: Vec<TmSignature>,
}

/// A validator signature paired with the address it was recovered as belonging to.
///
/// Kept paired rather than positional because the trimmer filters and re-sorts by
/// address, and the signature must travel with whichever address it was recovered
/// from rather than with its original index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredSignature {
    pub address: Address,
    pub signature: TmSignature,
}

//! The proof trimmer: deconstructs an oracle-chain relay proof and re-encodes
//! it carrying only the signatures needed to reach super-majority validator
//! power, which is all the `Bridge` contract requires to accept it.

use alloy_primitives::{Address, B256, Bytes, Signature};
use alloy_sol_types::SolValue;
use vrf_types::{
    BlockHeaderMerklePartsData, CommonEncodedVotePartData, MultiStoreData, ProofBundle,
    RecoveredSignature, RelayData, TmSignature, ValidatorPowerMap,
};

type MultiStoreTuple = (B256, B256, B256, B256, B256, B256);
type MerklePartsTuple = (B256, u64, u64, u32, B256, B256, B256, B256);
type CevpTuple = (Bytes, Bytes);
type SignatureTuple = (B256, B256, u8, Bytes);
type RelayDataTuple = (
    MultiStoreTuple,
    MerklePartsTuple,
    CevpTuple,
    Vec<SignatureTuple>,
);

#[derive(Debug, thiserror::Error)]
pub enum TrimError {
    #[error("failed to ABI-decode proof: {0}")]
    Decode(String),

    #[error("failed to recover validator address from signature: {0}")]
    Recovery(String),

    #[error("accumulated validator power does not exceed 2/3 of total power")]
    InsufficientPower,
}

/// Decodes the raw `(relayData, verifyData)` proof pair into [`ProofBundle`] plus
/// the decoded [`RelayData`].
fn decode_proof(evm_proof: &[u8]) -> Result<(ProofBundle, RelayData), TrimError> {
    let (relay_data, verify_data) = <(Bytes, Bytes)>::abi_decode(evm_proof)
        .map_err(|e| TrimError::Decode(e.to_string()))?;

    let (multi_store, merkle_parts, cevp, signatures): RelayDataTuple =
        RelayDataTuple::abi_decode(&relay_data).map_err(|e| TrimError::Decode(e.to_string()))?;

    let relay = RelayData {
        multi_store: MultiStoreData {
            oracle_iavl_state_hash: multi_store.0,
            params_store_merkle_hash: multi_store.1,
            slashing_to_stake_merkle_hash: multi_store.2,
            gov_to_main_merkle_hash: multi_store.3,
            distribution_to_upgrade_merkle_hash: multi_store.4,
            auth_to_fee_grant_merkle_hash: multi_store.5,
        },
        merkle_parts: BlockHeaderMerklePartsData {
            version_and_chain_id_hash: merkle_parts.0,
            height: merkle_parts.1,
            time_second: merkle_parts.2,
            time_nano_second_fraction: merkle_parts.3,
            last_block_id_and_other: merkle_parts.4,
            next_validator_hash_and_consensus_hash: merkle_parts.5,
            last_results_hash: merkle_parts.6,
            evidence_and_proposer_hash: merkle_parts.7,
        },
        cevp: CommonEncodedVotePartData {
            signed_data_prefix: cevp.0,
            signed_data_suffix: cevp.1,
        },
        signatures: signatures
            .into_iter()
            .map(|(r, s, v, encoded_timestamp)| TmSignature {
                r,
                s,
                v,
                encoded_timestamp,
            })
            .collect(),
    };

    Ok((
        ProofBundle {
            relay_data,
            verify_data,
        },
        relay,
    ))
}

fn encode_proof(relay: &RelayData, verify_data: &Bytes) -> Bytes {
    let multi_store: MultiStoreTuple = (
        relay.multi_store.oracle_iavl_state_hash,
        relay.multi_store.params_store_merkle_hash,
        relay.multi_store.slashing_to_stake_merkle_hash,
        relay.multi_store.gov_to_main_merkle_hash,
        relay.multi_store.distribution_to_upgrade_merkle_hash,
        relay.multi_store.auth_to_fee_grant_merkle_hash,
    );
    let merkle_parts: MerklePartsTuple = (
        relay.merkle_parts.version_and_chain_id_hash,
        relay.merkle_parts.height,
        relay.merkle_parts.time_second,
        relay.merkle_parts.time_nano_second_fraction,
        relay.merkle_parts.last_block_id_and_other,
        relay.merkle_parts.next_validator_hash_and_consensus_hash,
        relay.merkle_parts.last_results_hash,
        relay.merkle_parts.evidence_and_proposer_hash,
    );
    let cevp: CevpTuple = (
        relay.cevp.signed_data_prefix.clone(),
        relay.cevp.signed_data_suffix.clone(),
    );
    let signatures: Vec<SignatureTuple> = relay
        .signatures
        .iter()
        .map(|s| (s.r, s.s, s.v, s.encoded_timestamp.clone()))
        .collect();

    let relay_data_tuple: RelayDataTuple = (multi_store, merkle_parts, cevp, signatures);
    let relay_data_bytes = Bytes::from(relay_data_tuple.abi_encode());
    Bytes::from((relay_data_bytes, verify_data.clone()).abi_encode())
}

/// Recovers the signer address of a single vote signature.
///
/// `common = cevp.signed_data_prefix ++ block_hash ++ cevp.signed_data_suffix`;
/// the signed message is `common ++ [0x2A, len(encoded_timestamp)] ++
/// encoded_timestamp ++ encoded_band_chain_id`, hashed as
/// `sha256([len(msg)] ++ msg)`.
fn recover_signer(
    signature: &TmSignature,
    common: &[u8],
    encoded_band_chain_id: &[u8],
) -> Result<Address, TrimError> {
    let mut msg = Vec::with_capacity(
        common.len() + 2 + signature.encoded_timestamp.len() + encoded_band_chain_id.len(),
    );
    msg.extend_from_slice(common);
    msg.push(0x2A);
    msg.push(signature.encoded_timestamp.len() as u8);
    msg.extend_from_slice(&signature.encoded_timestamp);
    msg.extend_from_slice(encoded_band_chain_id);

    let mut prefixed = Vec::with_capacity(msg.len() + 1);
    prefixed.push(msg.len() as u8);
    prefixed.extend_from_slice(&msg);

    let digest = B256::from(sha256_digest(&prefixed));

    let parity = normalize_recovery_id(signature.v);
    let mut raw = [0u8; 65];
    raw[0..32].copy_from_slice(signature.r.as_slice());
    raw[32..64].copy_from_slice(signature.s.as_slice());
    raw[64] = parity as u8;

    let sig =
        Signature::from_raw_array(&raw).map_err(|e| TrimError::Recovery(e.to_string()))?;
    sig.recover_address_from_prehash(&digest)
        .map_err(|e| TrimError::Recovery(e.to_string()))
}

/// BandChain TM signatures carry Ethereum-style `v` (27/28); alloy's recovery
/// wants the raw recovery id (0/1).
fn normalize_recovery_id(v: u8) -> bool {
    let recovery_id = if v >= 27 { v - 27 } else { v };
    recovery_id != 0
}

fn sha256_digest(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Selects the smallest prefix of signatures (sorted by validator power
/// descending) whose accumulated power exceeds 2/3 of total power, then
/// re-sorts that subset by address ascending.
fn select_super_majority(
    recovered: Vec<RecoveredSignature>,
    validator_powers: &ValidatorPowerMap,
) -> Result<Vec<TmSignature>, TrimError> {
    let total_power = validator_powers.total_power();

    let mut with_power: Vec<(RecoveredSignature, alloy_primitives::U256)> = recovered
        .into_iter()
        .filter_map(|rs| {
            validator_powers
                .power_of(&rs.address)
                .map(|power| (rs, power))
        })
        .collect();
    with_power.sort_by(|a, b| b.1.cmp(&a.1));

    let mut accumulated = alloy_primitives::U256::ZERO;
    for i in 0..with_power.len() {
        accumulated += with_power[i].1;
        if accumulated * alloy_primitives::U256::from(3) > total_power * alloy_primitives::U256::from(2)
        {
            let mut selected = with_power[..=i].to_vec();
            selected.sort_by(|a, b| a.0.address.cmp(&b.0.address));
            return Ok(selected.into_iter().map(|(rs, _)| rs.signature).collect());
        }
    }
    Err(TrimError::InsufficientPower)
}

/// Trims a raw oracle proof down to the minimal signature set needed for the
/// `Bridge` contract to accept it.
pub fn trim(
    evm_proof: &[u8],
    block_hash: B256,
    encoded_band_chain_id: &[u8],
    validator_powers: &ValidatorPowerMap,
) -> Result<Bytes, TrimError> {
    let (bundle, mut relay) = decode_proof(evm_proof)?;

    let mut common = Vec::with_capacity(
        relay.cevp.signed_data_prefix.len() + 32 + relay.cevp.signed_data_suffix.len(),
    );
    common.extend_from_slice(&relay.cevp.signed_data_prefix);
    common.extend_from_slice(block_hash.as_slice());
    common.extend_from_slice(&relay.cevp.signed_data_suffix);

    // A recovery failure for an individual signature is non-fatal (spec.md
    // §4.3 step 3): that signature is simply discarded, not a hard error.
    let recovered = relay
        .signatures
        .iter()
        .filter_map(|sig| {
            recover_signer(sig, &common, encoded_band_chain_id)
                .ok()
                .map(|address| RecoveredSignature {
                    address,
                    signature: sig.clone(),
                })
        })
        .collect::<Vec<_>>();

    relay.signatures = select_super_majority(recovered, validator_powers)?;

    Ok(encode_proof(&relay, &bundle.verify_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn power_map(pairs: &[(Address, u64)]) -> ValidatorPowerMap {
        ValidatorPowerMap::try_from_pairs(
            pairs
                .iter()
                .map(|(a, p)| (*a, alloy_primitives::U256::from(*p))),
        )
        .unwrap()
    }

    fn sig(addr_seed: u8) -> RecoveredSignature {
        RecoveredSignature {
            address: Address::repeat_byte(addr_seed),
            signature: TmSignature {
                r: B256::ZERO,
                s: B256::ZERO,
                v: 27,
                encoded_timestamp: Bytes::new(),
            },
        }
    }

    #[test]
    fn selects_minimal_prefix_reaching_super_majority() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let c = Address::repeat_byte(0x03);
        let powers = power_map(&[(a, 50), (b, 30), (c, 20)]);

        let recovered = vec![
            RecoveredSignature {
                address: c,
                signature: sig(0x03).signature,
            },
            RecoveredSignature {
                address: a,
                signature: sig(0x01).signature,
            },
            RecoveredSignature {
                address: b,
                signature: sig(0x02).signature,
            },
        ];

        let selected = select_super_majority(recovered, &powers).unwrap();
        // a(50) alone is not > 2/3 of 100; a+b(80) is. a+b sorted by address ascending.
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn errors_when_power_insufficient() {
        let a = Address::repeat_byte(0x01);
        let powers = power_map(&[(a, 10), (Address::repeat_byte(0x02), 90)]);
        let recovered = vec![RecoveredSignature {
            address: a,
            signature: sig(0x01).signature,
        }];
        assert!(matches!(
            select_super_majority(recovered, &powers),
            Err(TrimError::InsufficientPower)
        ));
    }

    #[test]
    fn ignores_signatures_from_unknown_validators() {
        let a = Address::repeat_byte(0x01);
        let powers = power_map(&[(a, 100)]);
        let unknown = Address::repeat_byte(0xff);
        let recovered = vec![
            RecoveredSignature {
                address: a,
                signature: sig(0x01).signature,
            },
            RecoveredSignature {
                address: unknown,
                signature: sig(0xff).signature,
            },
        ];
        let selected = select_super_majority(recovered, &powers).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn recovery_failure_on_one_signature_does_not_fail_the_whole_trim() {
        // An invalid r/s pair fails recovery for that one signature; it is
        // discarded rather than aborting the trim (spec.md §4.3 step 3).
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let powers = power_map(&[(a, 60), (b, 40)]);

        let common = b"prefix-block-suffix".to_vec();
        let chain_id = b"band-laozi-mainnet".to_vec();

        let good_sig = TmSignature {
            r: B256::ZERO,
            s: B256::ZERO,
            v: 27,
            encoded_timestamp: Bytes::new(),
        };
        // r == s == 0 is never a valid secp256k1 signature, so recovery fails
        // for both in this unit test; the point is that a failure is
        // filtered out rather than propagated.
        let recovered: Vec<RecoveredSignature> = [good_sig]
            .iter()
            .filter_map(|sig| {
                recover_signer(sig, &common, &chain_id)
                    .ok()
                    .map(|address| RecoveredSignature {
                        address,
                        signature: sig.clone(),
                    })
            })
            .collect();
        assert!(recovered.is_empty());
        assert!(matches!(
            select_super_majority(recovered, &powers),
            Err(TrimError::InsufficientPower)
        ));
    }

    #[test]
    fn recovery_id_normalizes_ethereum_style_v() {
        assert!(!normalize_recovery_id(27));
        assert!(normalize_recovery_id(28));
        assert!(!normalize_recovery_id(0));
        assert!(normalize_recovery_id(1));
    }
}

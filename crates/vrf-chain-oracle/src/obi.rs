//! OBI (Oracle Binary Interface) encoding for the VRF worker's calldata schema.
//!
//! The schema is fixed for this deployment: `{seed:[u8],time:u64,
//! worker_address:[u8]}/{proof:[u8],result:[u8]}` (`spec.md` §4.2, §6), so
//! this module hand-encodes exactly that shape rather than pulling in a
//! general-purpose OBI codec. Scalars are big-endian fixed-width; dynamic
//! byte vectors are a 4-byte big-endian length prefix followed by the raw
//! bytes, matching BandChain's OBI spec.

/// Encodes the `MsgRequestData` calldata: `{seed:[u8], time:u64, worker_address:[u8]}`.
pub fn encode_request(seed: &[u8], time: u64, worker_address: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + seed.len() + 8 + 4 + worker_address.len());
    encode_bytes(&mut out, seed);
    out.extend_from_slice(&time.to_be_bytes());
    encode_bytes(&mut out, worker_address);
    out
}

/// Decodes the oracle script's output schema: `{proof:[u8], result:[u8]}`.
///
/// Not on the hot path (the EVM proof is fetched directly via the `Proof`
/// RPC, per §4.2), but kept since the schema is part of the oracle script's
/// public contract and is useful for exercising the codec in tests.
pub fn decode_result(data: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let (proof, rest) = decode_bytes(data)?;
    let (result, rest) = decode_bytes(rest)?;
    if !rest.is_empty() {
        return None;
    }
    Some((proof, result))
}

fn encode_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn decode_bytes(data: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    if data.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes(data[0..4].try_into().ok()?) as usize;
    let rest = &data[4..];
    if rest.len() < len {
        return None;
    }
    Some((rest[..len].to_vec(), &rest[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_request_lays_out_length_prefixed_seed_then_fixed_time_then_address() {
        let seed = [0xAAu8; 32];
        let worker_address = [0xBBu8; 20];
        let encoded = encode_request(&seed, 42, &worker_address);

        assert_eq!(&encoded[0..4], &32u32.to_be_bytes());
        assert_eq!(&encoded[4..36], &seed[..]);
        assert_eq!(&encoded[36..44], &42u64.to_be_bytes());
        assert_eq!(&encoded[44..48], &20u32.to_be_bytes());
        assert_eq!(&encoded[48..68], &worker_address[..]);
    }

    #[test]
    fn decode_result_round_trips() {
        let mut data = Vec::new();
        encode_bytes(&mut data, b"proof-bytes");
        encode_bytes(&mut data, b"result-bytes");
        let (proof, result) = decode_result(&data).unwrap();
        assert_eq!(proof, b"proof-bytes");
        assert_eq!(result, b"result-bytes");
    }

    #[test]
    fn decode_result_rejects_trailing_garbage() {
        let mut data = Vec::new();
        encode_bytes(&mut data, b"proof-bytes");
        encode_bytes(&mut data, b"result-bytes");
        data.push(0xFF);
        assert!(decode_result(&data).is_none());
    }
}

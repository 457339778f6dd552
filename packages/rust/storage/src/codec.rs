//! Candidate map <-> persisted blob.
//!
//! The blob is the JSON encoding of the map, zlib-deflated. The in-memory
//! shape never leaks into storage beyond that JSON.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use ndc_shared::{CandidateMap, NdcError, Result};

/// Encode and compress the candidate map.
pub fn encode_candidates(candidates: &CandidateMap) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(candidates)
        .map_err(|e| NdcError::Codec(format!("encode candidates: {e}")))?;

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len() / 4), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| NdcError::Codec(format!("deflate candidates: {e}")))?;
    encoder
        .finish()
        .map_err(|e| NdcError::Codec(format!("finalize candidates blob: {e}")))
}

/// Inflate and decode a blob produced by [`encode_candidates`].
pub fn decode_candidates(blob: &[u8]) -> Result<CandidateMap> {
    let mut json = Vec::new();
    ZlibDecoder::new(blob)
        .read_to_end(&mut json)
        .map_err(|e| NdcError::Codec(format!("inflate candidates: {e}")))?;

    serde_json::from_slice(&json).map_err(|e| NdcError::Codec(format!("decode candidates: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndc_shared::{CandidateRecord, NftHolding};

    fn sample_map(n: usize) -> CandidateMap {
        (0..n)
            .map(|i| {
                let id = format!("candidate-{i}.near");
                (id.clone(), CandidateRecord::stub(id, "CouncilOfAdvisors", "1690000000"))
            })
            .collect()
    }

    #[test]
    fn restores_partially_enriched_records() {
        let mut map = sample_map(2);
        let first = map.get_mut("candidate-0.near").expect("present");
        first.voters = Some(vec!["v1.near".into(), "v2.near".into()]);
        first.nfts = Some(vec![NftHolding {
            contract_id: "nft.example.near".into(),
            quantity: 3,
        }]);

        let blob = encode_candidates(&map).expect("encode");
        let restored = decode_candidates(&blob).expect("decode");
        assert_eq!(restored, map);
        assert_eq!(restored["candidate-1.near"].voters, None);
    }

    #[test]
    fn blob_is_compressed() {
        let map = sample_map(200);
        let json_len = serde_json::to_vec(&map).expect("json").len();
        let blob = encode_candidates(&map).expect("encode");
        assert!(blob.len() < json_len / 2, "{} vs {}", blob.len(), json_len);
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_candidates(b"definitely not zlib").unwrap_err();
        assert!(err.to_string().contains("codec error"));
    }

    #[test]
    fn rejects_valid_zlib_with_wrong_shape() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"[1,2,3]").expect("write");
        let blob = encoder.finish().expect("finish");
        assert!(decode_candidates(&blob).is_err());
    }
}

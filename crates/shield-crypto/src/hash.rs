//! Hashing utilities
//!
//! Keccak-256 is what EVM chains commit to (trie nodes, event topics).
//! BLAKE3 is used for identifiers and digests internal to the bridge.

/// Keccak-256 of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    alloy_primitives::keccak256(data).0
}

/// Topic 0 of an EVM event, e.g. `Deposit(address,string,uint256)`
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// Hash data using BLAKE3 (256-bit output)
pub fn hash_blake3(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple items together
pub fn hash_concat(items: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        hasher.update(item);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_transfer_topic() {
        assert_eq!(
            hex::encode(event_topic("Transfer(address,address,uint256)")),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_hash_concat_differs_from_parts() {
        let joined = hash_concat(&[b"ab", b"c"]);
        assert_eq!(joined, hash_blake3(b"abc"));
        assert_ne!(joined, hash_blake3(b"ab"));
    }
}

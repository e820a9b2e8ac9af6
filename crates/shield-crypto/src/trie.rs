//! Merkle-Patricia trie inclusion proofs
//!
//! Proof nodes are looked up by their Keccak-256 hash, starting from the
//! expected root. Nodes shorter than 32 bytes are embedded in their parent and
//! followed inline. Every step consumes at least one key nibble, so a walk
//! always terminates.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{Result, TrieError};
use crate::hash::keccak256;
use crate::rlp::{list_items, RlpItem};

/// Where a walk step ended up
enum Step {
    Value(Vec<u8>),
    Hash([u8; 32]),
}

/// Verify that `proof` proves `key` under `root` and return the stored value
pub fn verify_proof(root: &[u8; 32], key: &[u8], proof: &[Vec<u8>]) -> Result<Vec<u8>> {
    let db: HashMap<[u8; 32], &[u8]> = proof.iter().map(|node| (keccak256(node), node.as_slice())).collect();
    let path = to_nibbles(key);
    let mut pos = 0usize;
    let mut wanted = *root;

    loop {
        let node = db
            .get(&wanted)
            .ok_or_else(|| TrieError::MissingNode(hex::encode(wanted)))?;
        trace!(node = %hex::encode(&wanted[..4]), depth = pos, "walking proof node");
        match walk(node, &path, &mut pos)? {
            Step::Value(value) => return Ok(value),
            Step::Hash(next) => wanted = next,
        }
    }
}

/// Follow one hashed node, and any nodes embedded in it
fn walk(mut node: &[u8], path: &[u8], pos: &mut usize) -> Result<Step> {
    loop {
        let items = list_items(node)?;
        let child = match items.len() {
            2 => {
                let (nibbles, is_leaf) = decode_compact(string_payload(&items[0])?)?;
                let rest = &path[*pos..];
                if is_leaf {
                    if rest != nibbles.as_slice() {
                        return Err(TrieError::KeyNotFound);
                    }
                    return Ok(Step::Value(string_payload(&items[1])?.to_vec()));
                }
                if nibbles.is_empty() {
                    return Err(TrieError::InvalidNode("extension with empty path".into()));
                }
                if !rest.starts_with(&nibbles) {
                    return Err(TrieError::KeyNotFound);
                }
                *pos += nibbles.len();
                items[1]
            }
            17 => {
                if *pos == path.len() {
                    let value = string_payload(&items[16])?;
                    if value.is_empty() {
                        return Err(TrieError::KeyNotFound);
                    }
                    return Ok(Step::Value(value.to_vec()));
                }
                let child = items[path[*pos] as usize];
                *pos += 1;
                child
            }
            n => return Err(TrieError::InvalidNode(format!("node with {n} items"))),
        };

        if child.is_list {
            node = child.raw;
            continue;
        }
        return match child.payload.len() {
            0 => Err(TrieError::KeyNotFound),
            32 => {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(child.payload);
                Ok(Step::Hash(hash))
            }
            n => Err(TrieError::InvalidNode(format!("child reference of {n} bytes"))),
        };
    }
}

fn string_payload<'a>(item: &RlpItem<'a>) -> Result<&'a [u8]> {
    if item.is_list {
        return Err(TrieError::InvalidNode("expected string item".into()));
    }
    Ok(item.payload)
}

/// Split bytes into 4-bit nibbles, high nibble first
pub fn to_nibbles(key: &[u8]) -> Vec<u8> {
    key.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

/// Decode a hex-prefix encoded path into nibbles and the leaf flag
pub fn decode_compact(encoded: &[u8]) -> Result<(Vec<u8>, bool)> {
    let first = *encoded
        .first()
        .ok_or_else(|| TrieError::InvalidNode("empty path".into()))?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(TrieError::InvalidNode(format!("path flag {flag}")));
    }
    let is_leaf = flag & 2 != 0;
    let odd = flag & 1 != 0;
    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if odd {
        nibbles.push(first & 0x0f);
    } else if first & 0x0f != 0 {
        return Err(TrieError::InvalidNode("non-zero padding nibble".into()));
    }
    nibbles.extend(to_nibbles(&encoded[1..]));
    Ok((nibbles, is_leaf))
}

/// Encode nibbles with the hex-prefix scheme
pub fn encode_compact(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let odd = nibbles.len() % 2 == 1;
    let flag = (if is_leaf { 2 } else { 0 }) + u8::from(odd);
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let rest = if odd {
        out.push((flag << 4) | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    out.extend(rest.chunks(2).map(|pair| (pair[0] << 4) | pair[1]));
    out
}

/// Trie construction for producing proofs in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::encode_compact;
    use crate::hash::keccak256;
    use alloy_rlp::{Encodable, Header};
    use std::collections::BTreeMap;

    /// RLP string encoding of raw bytes
    pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        bytes.encode(&mut out);
        out
    }

    /// RLP list around already-encoded items
    pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
        let payload_length = items.iter().map(Vec::len).sum();
        let mut out = Vec::new();
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }

    /// A built trie: its root and every hashed node
    pub struct BuiltTrie {
        pub root: [u8; 32],
        pub nodes: Vec<Vec<u8>>,
    }

    /// In-memory trie builder
    #[derive(Default)]
    pub struct TrieBuilder {
        entries: BTreeMap<Vec<u8>, Vec<u8>>,
    }

    impl TrieBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> &mut Self {
            self.entries.insert(super::to_nibbles(key), value);
            self
        }

        pub fn build(&self) -> BuiltTrie {
            let entries: Vec<(&[u8], &[u8])> =
                self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())).collect();
            let mut nodes = Vec::new();
            let root_node = build_node(&entries, &mut nodes);
            let root = keccak256(&root_node);
            nodes.push(root_node);
            BuiltTrie { root, nodes }
        }
    }

    fn build_node(entries: &[(&[u8], &[u8])], nodes: &mut Vec<Vec<u8>>) -> Vec<u8> {
        if let [(path, value)] = entries {
            return encode_list(&[encode_bytes(&encode_compact(path, true)), encode_bytes(value)]);
        }

        let prefix = common_prefix(entries);
        if prefix > 0 {
            let stripped: Vec<(&[u8], &[u8])> = entries.iter().map(|(p, v)| (&p[prefix..], *v)).collect();
            let child = build_node(&stripped, nodes);
            return encode_list(&[
                encode_bytes(&encode_compact(&entries[0].0[..prefix], false)),
                reference(child, nodes),
            ]);
        }

        let mut items = Vec::with_capacity(17);
        for nibble in 0u8..16 {
            let group: Vec<(&[u8], &[u8])> = entries
                .iter()
                .filter(|(p, _)| p.first() == Some(&nibble))
                .map(|(p, v)| (&p[1..], *v))
                .collect();
            if group.is_empty() {
                items.push(encode_bytes(&[]));
            } else {
                let child = build_node(&group, nodes);
                items.push(reference(child, nodes));
            }
        }
        let value = entries.iter().find(|(p, _)| p.is_empty()).map(|(_, v)| *v).unwrap_or(&[]);
        items.push(encode_bytes(value));
        encode_list(&items)
    }

    fn reference(node: Vec<u8>, nodes: &mut Vec<Vec<u8>>) -> Vec<u8> {
        if node.len() < 32 {
            return node;
        }
        let hash = keccak256(&node);
        nodes.push(node);
        encode_bytes(&hash)
    }

    fn common_prefix(entries: &[(&[u8], &[u8])]) -> usize {
        let first = entries[0].0;
        let mut len = first.len();
        for (path, _) in &entries[1..] {
            len = len.min(first.iter().zip(path.iter()).take_while(|(a, b)| a == b).count());
        }
        len
    }
}

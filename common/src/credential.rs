//! Payment credentials and their bech32 owner identifiers

use crate::hash::{Hash, KeyHash, ScriptHash};
use blake2::{digest::consts::U28, Blake2b, Digest};
use serde::{Deserialize, Serialize};

const KEY_HASH_HRP: &str = "addr_vkh";
const SCRIPT_HASH_HRP: &str = "script";

/// Key-hash or script-hash credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Credential {
    VerificationKey(KeyHash),
    Script(ScriptHash),
}

impl Credential {
    pub fn hash(&self) -> &Hash<28> {
        match self {
            Credential::VerificationKey(hash) | Credential::Script(hash) => hash,
        }
    }

    /// `addr_vkh1...` for key hashes, `script1...` for script hashes
    pub fn to_bech32(&self) -> anyhow::Result<String> {
        match self {
            Credential::VerificationKey(hash) => hash.to_bech32(KEY_HASH_HRP),
            Credential::Script(hash) => hash.to_bech32(SCRIPT_HASH_HRP),
        }
    }
}

/// Blake2b-224 of a verification key, i.e. its payment key hash
pub fn vkey_hash(vkey: &[u8]) -> KeyHash {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update(vkey);
    let mut digest = [0u8; 28];
    digest.copy_from_slice(&hasher.finalize());
    Hash::new(digest)
}

/// Owner identity of a transaction under the single-signer rule: only a
/// transaction witnessed by exactly one verification key names its party.
pub fn single_signer(signatories: &[Vec<u8>]) -> Option<String> {
    match signatories {
        [vkey] => Credential::VerificationKey(vkey_hash(vkey)).to_bech32().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_key_and_script_prefixes() {
        let key = Credential::VerificationKey(Hash::new([1u8; 28]));
        let script = Credential::Script(Hash::new([1u8; 28]));
        assert!(key.to_bech32().unwrap().starts_with("addr_vkh1"));
        assert!(script.to_bech32().unwrap().starts_with("script1"));
    }

    #[test]
    fn should_hash_vkey_to_28_bytes() {
        let a = vkey_hash(&[3u8; 32]);
        let b = vkey_hash(&[4u8; 32]);
        assert_ne!(a, b);
        assert_eq!(a, vkey_hash(&[3u8; 32]));
    }

    #[test]
    fn should_only_attribute_single_signer() {
        let one = vec![vec![5u8; 32]];
        let two = vec![vec![5u8; 32], vec![6u8; 32]];
        let expected =
            Credential::VerificationKey(vkey_hash(&[5u8; 32])).to_bech32().unwrap();

        assert_eq!(single_signer(&one), Some(expected));
        assert_eq!(single_signer(&two), None);
        assert_eq!(single_signer(&[]), None);
    }
}

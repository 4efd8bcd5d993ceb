//! Asset units and bundles

use crate::hash::PolicyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distinguished unit for ada
pub const LOVELACE: &str = "lovelace";

/// `policy hex ++ asset name hex`
pub type Unit = String;

pub fn unit(policy: &PolicyId, name: &[u8]) -> Unit {
    format!("{}{}", policy, hex::encode(name))
}

/// CIP-67 asset name label: a zero nibble, the label as four hex digits, a
/// CRC-8 of the label bytes and a closing zero nibble.
pub fn cip67_label(label: u16) -> [u8; 4] {
    let crc = crc::Crc::<u8>::new(&crc::CRC_8_SMBUS).checksum(&label.to_be_bytes());
    (((label as u32) << 12) | ((crc as u32) << 4)).to_be_bytes()
}

/// Auxiliary token that the contract locks next to listed NFTs.
pub fn is_script_owner_marker(name: &[u8]) -> bool {
    let label = cip67_label(2);
    let suffix = [label.as_slice(), b"ScriptOwner"].concat();
    name.ends_with(&suffix)
}

/// Quantities keyed by unit. NFT and bid-token quantities are 0 or 1 and
/// lovelace stays far below 2^53, so plain `u64` is enough.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[serde(transparent)]
pub struct AssetBundle(#[n(0)] BTreeMap<Unit, u64>);

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: Unit, quantity: u64) {
        self.0.insert(unit, quantity);
    }

    pub fn get(&self, unit: &str) -> Option<u64> {
        self.0.get(unit).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Unit, &u64)> {
        self.0.iter()
    }

    /// Adds every entry of `other`, overwriting quantities of shared units
    pub fn merge(&mut self, other: &AssetBundle) {
        for (unit, quantity) in other.iter() {
            self.0.insert(unit.clone(), *quantity);
        }
    }

    pub fn contains_policy(&self, policy: &PolicyId) -> bool {
        let prefix = policy.to_hex();
        self.units().any(|u| u.starts_with(&prefix))
    }

    /// Every unit belongs to one of `policies`. Vacuously true when empty.
    pub fn all_under(&self, policies: &[PolicyId]) -> bool {
        let prefixes: Vec<String> = policies.iter().map(|p| p.to_hex()).collect();
        self.units().all(|u| prefixes.iter().any(|p| u.starts_with(p)))
    }
}

impl FromIterator<(Unit, u64)> for AssetBundle {
    fn from_iter<T: IntoIterator<Item = (Unit, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash;

    #[test]
    fn should_compute_cip67_labels() {
        assert_eq!(hex::encode(cip67_label(100)), "000643b0");
        assert_eq!(hex::encode(cip67_label(222)), "000de140");
        assert_eq!(hex::encode(cip67_label(2)), "000020e0");
    }

    #[test]
    fn should_detect_script_owner_marker() {
        let mut name = cip67_label(2).to_vec();
        name.extend_from_slice(b"ScriptOwner");
        assert!(is_script_owner_marker(&name));
        assert!(!is_script_owner_marker(b"Bud0"));
    }

    #[test]
    fn should_check_policy_membership() {
        let a: PolicyId = Hash::new([0xaa; 28]);
        let b: PolicyId = Hash::new([0xbb; 28]);
        let bundle: AssetBundle =
            [(unit(&a, b"Bud0"), 1), (unit(&a, b"Bud1"), 1)].into_iter().collect();

        assert!(bundle.all_under(&[a]));
        assert!(!bundle.all_under(&[b]));
        assert!(bundle.contains_policy(&a));
        assert!(AssetBundle::new().all_under(&[b]));
    }
}

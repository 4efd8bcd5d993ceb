use anyhow::{bail, Result};
use nebula_common::{BlockHash, ChainPoint};
use pallas::network::miniprotocols::chainsync::HeaderContent;
use pallas_traverse::MultiEraHeader;

/// Point of a chainsync header, ready for a blockfetch request
pub fn header_point(content: &HeaderContent) -> Result<ChainPoint> {
    // Get Byron sub-tag if any
    let tag = match content.byron_prefix {
        Some((tag, _)) => Some(tag),
        _ => None,
    };

    let header = MultiEraHeader::decode(content.variant, tag, &content.cbor)?;
    if let MultiEraHeader::EpochBoundary(_) = header {
        bail!("epoch boundary header carries no transactions");
    }
    Ok(ChainPoint::new(BlockHash::from(*header.hash()), header.slot()))
}

//! Storage key layouts.

use crate::{Error, Result};
use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Txid};

/// Convert OutPoint to storage key (36 bytes).
///
/// Format: txid (32 bytes, raw) || vout (4 bytes, little-endian)
pub(crate) fn outpoint_to_key(outpoint: &OutPoint) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(outpoint.txid.as_ref());
    key[32..].copy_from_slice(&outpoint.vout.to_le_bytes());
    key
}

/// Parse storage key back to OutPoint.
pub(crate) fn key_to_outpoint(key: &[u8]) -> Result<OutPoint> {
    if key.len() < 36 {
        return Err(Error::Corrupted(format!(
            "outpoint key has {} bytes",
            key.len()
        )));
    }
    let txid = key_to_txid(&key[..32])?;
    let vout = u32::from_le_bytes([key[32], key[33], key[34], key[35]]);
    Ok(OutPoint { txid, vout })
}

pub(crate) fn txid_key(txid: &Txid) -> [u8; 32] {
    txid.to_byte_array()
}

pub(crate) fn key_to_txid(key: &[u8]) -> Result<Txid> {
    let bytes: [u8; 32] = key
        .get(..32)
        .and_then(|k| k.try_into().ok())
        .ok_or_else(|| Error::Corrupted(format!("txid key has {} bytes", key.len())))?;
    Ok(Txid::from_byte_array(bytes))
}

/// Block key, big-endian so that keys iterate in height order.
pub(crate) fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

pub(crate) fn key_to_height(key: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = key
        .try_into()
        .map_err(|_| Error::Corrupted(format!("height key has {} bytes", key.len())))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Debit key: spender txid (32 bytes) || input index (4 bytes, big-endian).
pub(crate) fn debit_key(txid: &Txid, input: u32) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(txid.as_ref());
    key[32..].copy_from_slice(&input.to_be_bytes());
    key
}

pub(crate) fn key_to_debit_input(key: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = key
        .get(32..36)
        .and_then(|k| k.try_into().ok())
        .ok_or_else(|| Error::Corrupted(format!("debit key has {} bytes", key.len())))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Spend key: previous outpoint (36 bytes) || spender txid (32 bytes).
///
/// Prefix-scanning by the outpoint key yields every stored spender.
pub(crate) fn spend_key(prevout: &OutPoint, spender: &Txid) -> [u8; 68] {
    let mut key = [0u8; 68];
    key[..36].copy_from_slice(&outpoint_to_key(prevout));
    key[36..].copy_from_slice(spender.as_ref());
    key
}

pub(crate) fn key_to_spender(key: &[u8]) -> Result<Txid> {
    match key.get(36..68) {
        Some(txid) => key_to_txid(txid),
        None => Err(Error::Corrupted(format!(
            "spend key has {} bytes",
            key.len()
        ))),
    }
}

pub(crate) fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

pub(crate) fn decode_u32(bytes: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::Corrupted(format!("u32 value has {} bytes", bytes.len())))?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outpoint_key_roundtrip() {
        let outpoint = OutPoint {
            txid: Txid::from_byte_array([7u8; 32]),
            vout: 42,
        };

        let key = outpoint_to_key(&outpoint);
        let decoded = key_to_outpoint(&key).unwrap();

        assert_eq!(outpoint, decoded);
    }

    #[test]
    fn test_height_keys_sort_by_height() {
        let mut keys = vec![height_key(256), height_key(1), height_key(70_000)];
        keys.sort();
        assert_eq!(
            keys.iter()
                .map(|k| key_to_height(k).unwrap())
                .collect::<Vec<_>>(),
            vec![1, 256, 70_000]
        );
    }

    #[test]
    fn test_spend_key_has_outpoint_prefix() {
        let prevout = OutPoint {
            txid: Txid::from_byte_array([1u8; 32]),
            vout: 3,
        };
        let spender = Txid::from_byte_array([2u8; 32]);

        let key = spend_key(&prevout, &spender);

        assert!(key.starts_with(&outpoint_to_key(&prevout)));
        assert_eq!(key_to_spender(&key).unwrap(), spender);
    }

    #[test]
    fn test_debit_keys_group_by_spender() {
        let txid = Txid::from_byte_array([9u8; 32]);
        let key = debit_key(&txid, 258);

        assert!(key.starts_with(&txid_key(&txid)));
        assert_eq!(key_to_debit_input(&key).unwrap(), 258);
    }

    #[test]
    fn test_corrupted_keys_are_rejected() {
        assert!(matches!(key_to_outpoint(&[0u8; 10]), Err(Error::Corrupted(_))));
        assert!(matches!(key_to_height(&[0u8; 3]), Err(Error::Corrupted(_))));
        assert!(matches!(decode_u32(&[0u8; 5]), Err(Error::Corrupted(_))));
    }
}

//! Shared fixtures for the store integration tests.

#![allow(dead_code)]

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, BlockHash, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use subcoin_wallet_txstore::{BlockMeta, TxRecord, TxStore, TxStoreOptions};
use tempfile::TempDir;

/// Coinbase maturity used by the scenario tests.
pub const MATURITY: u32 = 16;

pub fn open_store() -> (TempDir, TxStore) {
    open_store_with_maturity(MATURITY)
}

pub fn open_store_with_maturity(maturity: u32) -> (TempDir, TxStore) {
    let dir = tempfile::tempdir().unwrap();
    let options = TxStoreOptions::builder()
        .coinbase_maturity(maturity)
        .write_buffer_size(1 << 20)
        .build();
    let store = TxStore::open_with_options(dir.path(), options).unwrap();
    (dir, store)
}

/// Deterministic block at `height`.
pub fn block(height: u32) -> BlockMeta {
    block_with_tag(height, 0)
}

/// Block at `height` whose hash differs for every `tag`.
pub fn block_with_tag(height: u32, tag: u8) -> BlockMeta {
    let mut hash = [0u8; 32];
    hash[..4].copy_from_slice(&height.to_le_bytes());
    hash[31] = tag;
    BlockMeta::new(height, BlockHash::from_byte_array(hash), 1_600_000_000 + height)
}

fn outputs(values: &[u64]) -> Vec<TxOut> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| TxOut {
            value: Amount::from_sat(*value),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51 + (i as u8 % 16)]),
        })
        .collect()
}

/// Coinbase paying `values`, made unique by `height`.
pub fn coinbase(height: u32, values: &[u64]) -> Transaction {
    let mut script_sig = vec![0x04];
    script_sig.extend_from_slice(&height.to_le_bytes());
    Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::from_bytes(script_sig),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs(values),
    }
}

/// Transaction spending every outpoint in `prevouts`.
pub fn spend_outputs(prevouts: &[OutPoint], values: &[u64]) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: prevouts
            .iter()
            .map(|prevout| TxIn {
                previous_output: *prevout,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect(),
        output: outputs(values),
    }
}

pub fn spend_output(txid: Txid, vout: u32, values: &[u64]) -> Transaction {
    spend_outputs(&[OutPoint { txid, vout }], values)
}

/// Outpoint of a transaction not tracked by the wallet.
pub fn foreign_outpoint(tag: u8, vout: u32) -> OutPoint {
    OutPoint {
        txid: Txid::from_byte_array([tag; 32]),
        vout,
    }
}

pub fn record(tx: Transaction, received: u64) -> TxRecord {
    TxRecord::new(tx, received)
}

pub fn sat(value: u64) -> Amount {
    Amount::from_sat(value)
}

pub fn unspent(store: &TxStore) -> Vec<OutPoint> {
    let mut outpoints = store
        .unspent_outputs()
        .unwrap()
        .into_iter()
        .map(|credit| credit.outpoint)
        .collect::<Vec<_>>();
    outpoints.sort();
    outpoints
}

pub fn unmined(store: &TxStore) -> Vec<Txid> {
    let mut txids = store.unmined_tx_hashes().unwrap();
    txids.sort();
    txids
}

pub fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}

mod common;

use bitcoin::OutPoint;
use common::*;
use subcoin_wallet_txstore::{BalanceFilter, Credit, Error, TxDetails, TxStore};

#[derive(Debug, PartialEq)]
struct Snapshot {
    unspent: Vec<Credit>,
    unmined: Vec<bitcoin::Txid>,
    balance: bitcoin::Amount,
    details: Vec<TxDetails>,
}

fn snapshot(store: &TxStore, txids: &[bitcoin::Txid]) -> Snapshot {
    Snapshot {
        unspent: store.unspent_outputs().unwrap(),
        unmined: store.unmined_tx_hashes().unwrap(),
        balance: store
            .balance(0, 1_000, BalanceFilter::Spendable)
            .unwrap(),
        details: txids
            .iter()
            .map(|txid| store.unique_tx_details(txid, None).unwrap())
            .collect(),
    }
}

#[test]
fn test_rollback_restores_unmined_state() {
    let (_dir, store) = open_store();

    let fund = record(spend_output(foreign_outpoint(0x31, 0).txid, 0, &[500_000]), 1);
    store.insert_tx(&fund, Some(&block(10))).unwrap();
    store.add_credit(&fund, None, 0, false).unwrap();

    let spend = record(spend_output(fund.txid, 0, &[200_000, 290_000]), 2);
    store.insert_tx(&spend, None).unwrap();
    store.add_credit(&spend, None, 1, true).unwrap();

    let child = record(spend_output(spend.txid, 1, &[280_000]), 3);
    store.insert_tx(&child, None).unwrap();
    store.add_credit(&child, None, 0, false).unwrap();

    let txids = [fund.txid, spend.txid, child.txid];
    let before = snapshot(&store, &txids);

    store.insert_tx(&spend, Some(&block(20))).unwrap();
    store.insert_tx(&child, Some(&block(21))).unwrap();
    assert!(store.unmined_tx_hashes().unwrap().is_empty());
    assert_ne!(snapshot(&store, &txids), before);

    store.rollback(20).unwrap();

    assert_eq!(snapshot(&store, &txids), before);
    assert!(store.block_txs(20).unwrap().is_none());
    assert!(store.block_txs(21).unwrap().is_none());
    assert!(store.block_txs(10).unwrap().is_some());
}

#[test]
fn test_rollback_above_tip_is_noop() {
    let (_dir, store) = open_store();

    let fund = record(spend_output(foreign_outpoint(0x32, 0).txid, 0, &[1_000]), 1);
    store.insert_tx(&fund, Some(&block(10))).unwrap();
    store.add_credit(&fund, None, 0, false).unwrap();

    let before = snapshot(&store, &[fund.txid]);
    store.rollback(11).unwrap();
    assert_eq!(snapshot(&store, &[fund.txid]), before);
}

#[test]
fn test_rollback_keeps_block_order() {
    let (_dir, store) = open_store();

    let records = (0..3u8)
        .map(|i| record(spend_output(foreign_outpoint(0x40 + i, 0).txid, 0, &[1_000]), 1))
        .collect::<Vec<_>>();
    let b = block(30);
    store.insert_block_txs(&b, &records).unwrap();

    let expected = records.iter().map(|r| r.txid).collect::<Vec<_>>();
    assert_eq!(store.block_txs(30).unwrap(), Some((b, expected.clone())));

    store.rollback(30).unwrap();
    assert_eq!(unmined(&store), sorted(expected));
}

#[test]
fn test_reconfirm_in_replacement_block() {
    let (_dir, store) = open_store();

    let a = record(spend_output(foreign_outpoint(0x51, 0).txid, 0, &[1_000]), 1);
    let b = record(spend_output(foreign_outpoint(0x52, 0).txid, 0, &[2_000]), 2);
    let main = block_with_tag(40, 1);
    let fork = block_with_tag(40, 2);

    store.insert_block_txs(&main, &[a.clone(), b.clone()]).unwrap();
    store.add_credit(&a, Some(&main), 0, false).unwrap();

    store.insert_tx(&a, Some(&fork)).unwrap();

    assert_eq!(store.block_txs(40).unwrap(), Some((fork, vec![a.txid])));
    assert_eq!(unmined(&store), vec![b.txid]);

    let details = store.unique_tx_details(&a.txid, Some(&fork.block)).unwrap();
    assert_eq!(details.block, Some(fork));
    assert!(matches!(
        store.unique_tx_details(&a.txid, Some(&main.block)),
        Err(Error::BlockMismatch { .. })
    ));

    assert_eq!(unspent(&store), vec![OutPoint::new(a.txid, 0)]);
    assert_eq!(
        store.balance(1, 40, BalanceFilter::Spendable).unwrap(),
        sat(1_000)
    );
}

#[test]
fn test_replacement_block_drops_stale_coinbase() {
    let (_dir, store) = open_store();

    let main = block_with_tag(40, 1);
    let fork = block_with_tag(40, 2);
    let cb = record(coinbase(40, &[5_000]), 1);
    store.insert_tx(&cb, Some(&main)).unwrap();
    store.add_credit(&cb, Some(&main), 0, false).unwrap();

    let spend = record(spend_output(cb.txid, 0, &[4_000]), 2);
    store.insert_tx(&spend, None).unwrap();
    store.add_credit(&spend, None, 0, false).unwrap();

    let other = record(spend_output(foreign_outpoint(0x53, 0).txid, 0, &[3_000]), 3);
    store.insert_tx(&other, Some(&fork)).unwrap();

    assert_eq!(store.block_txs(40).unwrap(), Some((fork, vec![other.txid])));
    for removed in [cb.txid, spend.txid] {
        assert!(matches!(
            store.unique_tx_details(&removed, None),
            Err(Error::TxNotFound(_))
        ));
    }
    assert!(unmined(&store).is_empty());
    assert!(unspent(&store).is_empty());
}

#[test]
fn test_moving_between_blocks() {
    let (_dir, store) = open_store();

    let a = record(spend_output(foreign_outpoint(0x61, 0).txid, 0, &[1_000]), 1);
    let b = record(spend_output(foreign_outpoint(0x62, 0).txid, 0, &[1_000]), 1);
    store.insert_block_txs(&block(50), &[a.clone(), b.clone()]).unwrap();

    store.insert_tx(&a, Some(&block(52))).unwrap();
    assert_eq!(
        store.block_txs(50).unwrap().map(|(_, txids)| txids),
        Some(vec![b.txid])
    );
    assert_eq!(
        store
            .unique_tx_details(&a.txid, None)
            .unwrap()
            .block
            .map(|meta| meta.height()),
        Some(52)
    );

    store.insert_tx(&b, Some(&block(52))).unwrap();
    assert!(store.block_txs(50).unwrap().is_none());
    assert_eq!(
        store.block_txs(52).unwrap().map(|(_, txids)| txids),
        Some(vec![a.txid, b.txid])
    );

    // A credit on the moved transaction follows it.
    store.add_credit(&a, Some(&block(52)), 0, false).unwrap();
    store.rollback(51).unwrap();
    let unspent = store.unspent_outputs().unwrap();
    assert_eq!(unspent.len(), 1);
    assert_eq!(unspent[0].outpoint, OutPoint::new(a.txid, 0));
    assert_eq!(unspent[0].block, None);
}

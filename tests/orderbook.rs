//! Integration coverage for the Book Engine's public API (spec §8), exercised only through
//! `kalshi_stream::Orderbook` rather than the white-box unit tests colocated in `src/book.rs`.

use kalshi_stream::{Orderbook, StreamError};

#[test]
fn full_update_sequence_keeps_sides_sorted_and_uncrossed() {
    let mut book = Orderbook::new();
    book.apply_snapshot("T", Some(1), &[(40, 5), (41, 3)], &[(55, 2), (56, 4)])
        .expect("snapshot applies");

    book.apply_delta("T", Some(2), kalshi_stream::QuoteSide::Yes, 42, 10)
        .expect("delta applies");
    book.apply_delta("T", Some(3), kalshi_stream::QuoteSide::No, 56, -4)
        .expect("delta applies");

    assert_eq!(book.bids()[0].price, 42);
    assert_eq!(book.asks(), &[kalshi_stream::book::Level::new(44, 2)]);
    assert_eq!(book.last_seq(), 3);
    assert!(!book.desynced());
}

#[test]
fn a_gap_flags_desync_and_a_fresh_snapshot_clears_it() {
    let mut book = Orderbook::new();
    book.apply_snapshot("T", Some(10), &[(40, 5)], &[(55, 2)]).unwrap();

    let err = book.apply_delta("T", Some(20), kalshi_stream::QuoteSide::Yes, 40, 1);
    assert!(matches!(err, Err(StreamError::SequenceGap { .. })));
    assert!(book.desynced());

    book.apply_snapshot("T", Some(21), &[(39, 1)], &[(60, 1)])
        .expect("fresh snapshot recovers from desync");
    assert!(!book.desynced());
    assert_eq!(book.last_seq(), 21);
}

#[test]
fn spread_and_mid_are_none_on_an_empty_book() {
    let book = Orderbook::new();
    assert_eq!(book.spread(), None);
    assert_eq!(book.mid(), None);
    assert_eq!(book.micro(), None);
}

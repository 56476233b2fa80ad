use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

use pagemark::metrics::metrics_snapshot;
use pagemark::{
    ContributorLedger, ManualClock, MemoryStore, PagingConfig, PagingError, PagingService,
    RecordStore, ServiceBuilder, StrategyKind, Timestamp,
};

const T0: Timestamp = Timestamp(1_700_000_000_000_000);

fn service(kind: StrategyKind, store: Arc<MemoryStore>) -> PagingService<MemoryStore> {
    ServiceBuilder::new()
        .config(PagingConfig::default().with_strategy(kind))
        .token_clock(Arc::new(ManualClock::ticking(T0, 10)))
        .build(store)
}

fn texts(page: &pagemark::Page) -> Vec<&str> {
    page.records.iter().map(|r| r.text.as_str()).collect()
}

#[test]
fn six_records_page_five_every_strategy() -> Result<()> {
    for kind in StrategyKind::ALL {
        let store = Arc::new(MemoryStore::with_clock(Arc::new(ManualClock::ticking(T0, 1_000))));
        let svc = service(kind, store);
        let added = svc.populate(None, Some("alice"))?;
        assert_eq!(added.len(), 6, "{kind}");

        let first = svc.first_page(5)?;
        assert_eq!(
            texts(&first),
            ["Suggestion 5", "Suggestion 4", "Suggestion 3", "Suggestion 2", "Suggestion 1"],
            "{kind}"
        );
        let bookmark = first.next_bookmark.clone().expect("first page has a bookmark");
        assert!(
            bookmark
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.'),
            "{kind}: bookmark must be URL-safe: {bookmark}"
        );

        let second = svc.get_page(Some(&bookmark), 5)?;
        assert_eq!(texts(&second), ["Suggestion 0"], "{kind}");
        assert!(second.is_last(), "{kind}");
    }
    Ok(())
}

#[test]
fn exact_multiple_has_no_trailing_empty_page() -> Result<()> {
    for kind in StrategyKind::ALL {
        let store = Arc::new(MemoryStore::with_clock(Arc::new(ManualClock::ticking(T0, 7))));
        let svc = service(kind, store);
        svc.populate(Some(5), Some("bob"))?;
        let only = svc.first_page(5)?;
        assert_eq!(only.len(), 5, "{kind}");
        assert!(only.is_last(), "{kind}");

        let empty = service(kind, Arc::new(MemoryStore::new())).first_page(5)?;
        assert!(empty.is_empty() && empty.is_last(), "{kind}");
    }
    Ok(())
}

#[test]
fn key_range_walks_one_shared_timestamp() -> Result<()> {
    let store = Arc::new(MemoryStore::with_clock(Arc::new(ManualClock::frozen(T0))));
    let svc = service(StrategyKind::KeyRange, store.clone());
    svc.populate(Some(12), None)?;

    let mut seen = Vec::new();
    let mut sizes = Vec::new();
    let mut bookmark: Option<String> = None;
    loop {
        let page = svc.get_page(bookmark.as_deref(), 5)?;
        sizes.push(page.len());
        seen.extend(page.records.iter().map(|r| r.identity.clone()));
        match page.next_bookmark {
            Some(b) => bookmark = Some(b),
            None => break,
        }
    }
    assert_eq!(sizes, [5, 5, 2]);

    let mut expected: Vec<String> = store
        .scan_created_at(T0, None, usize::MAX)?
        .into_iter()
        .map(|r| r.identity)
        .collect();
    expected.sort();
    assert_eq!(seen, expected, "ties are ordered by ascending identity");
    Ok(())
}

#[test]
fn unique_token_interleaved_contributors() -> Result<()> {
    let store = Arc::new(MemoryStore::with_clock(Arc::new(ManualClock::frozen(T0))));
    let svc = service(StrategyKind::UniqueToken, store.clone());
    for i in 0..4 {
        svc.append_record(&format!("alice {i}"), Some("alice"))?;
        svc.append_record(&format!("bob {i}"), Some("bob"))?;
    }
    svc.append_record("alice 4", Some("alice"))?;

    let first = svc.first_page(5)?;
    assert_eq!(
        texts(&first),
        ["alice 4", "bob 3", "alice 3", "bob 2", "alice 2"]
    );
    let rest = svc.get_page(first.next_bookmark.as_deref(), 5)?;
    assert_eq!(texts(&rest), ["bob 1", "alice 1", "bob 0", "alice 0"]);
    assert!(rest.is_last());

    let tokens: HashSet<String> = first
        .records
        .iter()
        .chain(rest.records.iter())
        .filter_map(|r| r.creation_token.clone())
        .collect();
    assert_eq!(tokens.len(), 9);
    assert_eq!(store.load_contributor("alice")?.map(|c| c.sequence), Some(5));
    assert_eq!(store.load_contributor("bob")?.map(|c| c.sequence), Some(4));
    Ok(())
}

#[test]
fn malformed_bookmarks_are_rejected_per_strategy() -> Result<()> {
    let garbage = ["%%%", "Zm9v", "YWJjfGRlZg", "00000000000000000001.zz"];
    for kind in StrategyKind::ALL {
        let svc = service(kind, Arc::new(MemoryStore::new()));
        svc.populate(Some(3), Some("carol"))?;
        for bad in garbage {
            let before = metrics_snapshot().bookmarks_rejected;
            let err = svc.get_page(Some(bad), 5).unwrap_err();
            assert!(
                matches!(err, PagingError::InvalidBookmark(_)),
                "{kind} accepted {bad:?}: {err}"
            );
            assert!(err.is_recoverable());
            assert!(metrics_snapshot().bookmarks_rejected > before);
        }
    }
    Ok(())
}

#[test]
fn bookmarks_are_not_interchangeable_between_strategies() -> Result<()> {
    let store = Arc::new(MemoryStore::with_clock(Arc::new(ManualClock::ticking(T0, 1))));
    let tokens = service(StrategyKind::UniqueToken, store.clone());
    tokens.populate(Some(4), Some("dave"))?;
    let token_bookmark = tokens.first_page(2)?.next_bookmark.expect("more pages");

    let keys = service(StrategyKind::KeyRange, store.clone());
    let key_bookmark = keys.first_page(2)?.next_bookmark.expect("more pages");

    assert!(matches!(
        keys.get_page(Some(&token_bookmark), 2),
        Err(PagingError::InvalidBookmark(_))
    ));
    assert!(matches!(
        tokens.get_page(Some(&key_bookmark), 2),
        Err(PagingError::InvalidBookmark(_))
    ));
    Ok(())
}

#[test]
fn zero_page_size_is_invalid_argument() {
    for kind in StrategyKind::ALL {
        let svc = service(kind, Arc::new(MemoryStore::new()));
        let err = svc.get_page(None, 0).unwrap_err();
        assert!(matches!(err, PagingError::InvalidArgument(_)), "{kind}");
    }
}

#[test]
fn native_needs_a_native_store() -> Result<()> {
    let store = Arc::new(MemoryStore::new().without_native_scan());
    let svc = service(StrategyKind::Native, store);
    svc.populate(Some(2), None)?;
    let err = svc.first_page(5).unwrap_err();
    assert!(matches!(err, PagingError::Unsupported(_)));
    assert!(!err.is_recoverable());

    // key-range does not care
    let kr = service(StrategyKind::KeyRange, svc.store().clone());
    assert_eq!(kr.first_page(5)?.len(), 2);
    Ok(())
}

#[test]
fn get_record_and_not_found() -> Result<()> {
    let svc = service(StrategyKind::KeyRange, Arc::new(MemoryStore::new()));
    let r = svc.append_record("hello", None)?;
    assert_eq!(svc.get_record(&r.identity)?, r);
    assert!(matches!(
        svc.get_record("ffffffffffffffff"),
        Err(PagingError::NotFound(_))
    ));
    Ok(())
}

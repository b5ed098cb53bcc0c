// Integration tests for the index gateway

use crate::common::{create_test_gateway, numbered_messages, travel_messages, TRAVEL_QUERY};
use chrono::{DateTime, Utc};
use mailgate::core::backend::{Fault, HandleKind, MemoryBackend};
use mailgate::{MailgateError, SearchParameters};

#[test]
fn test_travel_search_with_defaults() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);

    let params = SearchParameters::from_raw(Some(TRAVEL_QUERY), None, None).unwrap();
    let results = gateway.search(&params).expect("Search failed");

    assert_eq!(results.query, "tag:travel");
    assert_eq!(results.count, 3);
    assert_eq!(results.results.len(), 3);

    // Newest first
    let dates: Vec<i64> = results.results.iter().map(|r| r.date.timestamp()).collect();
    assert_eq!(dates, [1_700_500_000, 1_700_000_000, 1_699_000_000]);
    assert!(backend.is_balanced());
}

#[test]
fn test_search_never_exceeds_limit() {
    let backend = MemoryBackend::with_messages(numbered_messages(120));
    let gateway = create_test_gateway(&backend);

    for (limit, expected) in [(None, 50), (Some("7"), 7), (Some("500"), 120), (Some("nope"), 50)] {
        let params = SearchParameters::from_raw(Some("tag:bulk"), limit, None).unwrap();
        let results = gateway.search(&params).unwrap();

        assert_eq!(results.count, 120, "count is independent of the limit");
        assert_eq!(results.results.len(), expected, "limit {limit:?}");
    }

    // Only materialized records were loaded: 50 + 7 + 120 + 50
    assert_eq!(backend.acquired(HandleKind::Message), 227);
    assert!(backend.is_balanced());
}

#[test]
fn test_search_oldest_first() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);

    let params =
        SearchParameters::from_raw(Some(TRAVEL_QUERY), Some("1"), Some("oldest_first")).unwrap();
    let results = gateway.search(&params).unwrap();

    assert_eq!(results.count, 3);
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].message_id, "<train@rail.example>");
}

#[test]
fn test_search_record_shape() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);

    let params = SearchParameters::from_raw(Some("id:flight@airline.example"), None, None).unwrap();
    let results = gateway.search(&params).unwrap();
    let record = &results.results[0];

    assert_eq!(record.message_id, "<flight@airline.example>");
    assert_eq!(record.thread_id, "0000000000000001");
    assert_eq!(record.from, "Airline <noreply@airline.example>");
    assert_eq!(record.subject, "Flight Confirmation");
    assert_eq!(record.tags, ["inbox", "travel"]);
    assert_eq!(record.filename, "/mail/cur/flight.eml");
}

#[test]
fn test_unusable_date_becomes_epoch() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);

    let record = gateway
        .get_by_id("<nodate@example.com>")
        .unwrap()
        .expect("message should exist");
    assert_eq!(record.date, DateTime::<Utc>::default());
    assert_eq!(record.from, "");
    assert!(record.tags.is_empty());
}

#[test]
fn test_get_missing_against_empty_backend() {
    let backend = MemoryBackend::new();
    let gateway = create_test_gateway(&backend);

    let found = gateway.get_by_id("<missing@x>").expect("not-found is not an error");
    assert!(found.is_none());
    assert!(backend.is_balanced());
}

#[test]
fn test_get_is_repeatable() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);

    let first = gateway.get_by_id("<hotel@hotel.example>").unwrap();
    let second = gateway.get_by_id("<hotel@hotel.example>").unwrap();
    assert_eq!(first, second);
    assert_eq!(backend.acquired(HandleKind::Database), 2);
}

#[test]
fn test_tag_scenario() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);

    let record = gateway
        .tag_by_id("<12345@example.com>", "archived")
        .expect("Tagging failed")
        .expect("message should exist");

    assert!(record.tags.iter().any(|t| t == "archived"));

    // Visible to later reads
    let reread = gateway.get_by_id("<12345@example.com>").unwrap().unwrap();
    assert_eq!(reread.tags, record.tags);

    // And to searches on the new tag
    let params = SearchParameters::from_raw(Some("tag:archived"), None, None).unwrap();
    assert_eq!(gateway.search(&params).unwrap().count, 1);

    assert!(backend.is_balanced());
    assert!(!backend.is_write_locked());
}

#[test]
fn test_tag_missing_attempts_no_mutation() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);
    // Any attempted mutation would now surface as an error
    backend.fail(Fault::Tag, "tagging must not be attempted");

    let found = gateway.tag_by_id("<missing@x>", "archived").unwrap();
    assert!(found.is_none());
    assert!(backend.is_balanced());
}

#[test]
fn test_every_failure_path_is_balanced() {
    let faults = [
        Fault::Open,
        Fault::OpenWrite,
        Fault::Query,
        Fault::Search,
        Fault::Count,
        Fault::Load,
        Fault::Lookup,
        Fault::Tag,
    ];

    for fault in faults {
        let backend = MemoryBackend::with_messages(travel_messages());
        let gateway = create_test_gateway(&backend);
        backend.fail(fault, "injected");

        let params = SearchParameters::from_raw(Some(TRAVEL_QUERY), None, None).unwrap();
        let _ = gateway.check_connection();
        let _ = gateway.search(&params);
        let _ = gateway.get_by_id("<flight@airline.example>");
        let _ = gateway.tag_by_id("<flight@airline.example>", "seen");

        assert_eq!(backend.outstanding(), 0, "leak with {fault:?}");
        assert!(backend.is_balanced(), "unbalanced with {fault:?}");
        assert!(!backend.is_write_locked(), "writer lock leaked with {fault:?}");
    }
}

#[test]
fn test_failures_carry_backend_diagnostic() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);
    backend.fail(Fault::Count, "Xapian exception: database modified");

    let params = SearchParameters::from_raw(Some(TRAVEL_QUERY), None, None).unwrap();
    match gateway.search(&params).unwrap_err() {
        MailgateError::CountFailed(diagnostic) => {
            assert_eq!(diagnostic, "Xapian exception: database modified")
        }
        other => panic!("Expected CountFailed, got {other:?}"),
    }
}

#[test]
fn test_write_open_failure_only_affects_tagging() {
    let backend = MemoryBackend::with_messages(travel_messages());
    let gateway = create_test_gateway(&backend);
    backend.fail(Fault::OpenWrite, "Permission denied");

    assert!(gateway.check_connection().is_ok());
    assert!(gateway.get_by_id("<flight@airline.example>").unwrap().is_some());

    let err = gateway
        .tag_by_id("<flight@airline.example>", "seen")
        .unwrap_err();
    assert!(matches!(err, MailgateError::BackendUnavailable(_)));
    assert_eq!(
        backend.message("<flight@airline.example>").unwrap().tags,
        ["inbox", "travel"]
    );
}

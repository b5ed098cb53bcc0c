// Integration tests for the gateway over the notmuch command-line backend
//
// Each test drives a shell script standing in for `notmuch`.

use crate::common::write_stub_notmuch;
use mailgate::core::backend::NotmuchCli;
use mailgate::{IndexGateway, MailgateError, SearchParameters, SortOrder};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn cli_gateway(temp_dir: &TempDir, script: &str) -> IndexGateway<NotmuchCli> {
    let stub = write_stub_notmuch(temp_dir.path(), script);
    IndexGateway::new(NotmuchCli::new(stub), temp_dir.path())
}

const CORRUPT_DATABASE: &str = r##"#!/bin/sh
case "$1" in
  count) echo 3 ;;
  search) echo '["a@example.com","b@example.com","c@example.com"]' ;;
  show) echo "A Xapian exception occurred: DatabaseCorruptError" >&2; exit 1 ;;
  *) exit 0 ;;
esac
"##;

#[test]
#[serial]
fn test_failing_record_load_fails_the_search() {
    let temp_dir = TempDir::new().unwrap();
    let gateway = cli_gateway(&temp_dir, CORRUPT_DATABASE);

    assert!(gateway.check_connection().is_ok());

    let params = SearchParameters::from_raw(Some("tag:travel"), None, None).unwrap();
    match gateway.search(&params).unwrap_err() {
        MailgateError::QueryExecutionFailed(diagnostic) => {
            assert!(diagnostic.contains("DatabaseCorruptError"), "{diagnostic}")
        }
        other => panic!("Expected QueryExecutionFailed, got {other:?}"),
    }

    let err = gateway.get_by_id("<a@example.com>").unwrap_err();
    assert!(matches!(err, MailgateError::LookupFailed(_)));
}

const WRITE_LOCKED: &str = r##"#!/bin/sh
case "$1" in
  count) echo 1 ;;
  search)
    case "$*" in
      *--output=summary*) echo '[{"thread":"0000000000000001","query":["id:a@example.com",null]}]' ;;
      *) echo '["a@example.com"]' ;;
    esac ;;
  show) echo '[[[{"id":"a@example.com","timestamp":1700000000,"tags":["inbox"],"filename":["/mail/cur/a"],"headers":{"Subject":"Flight"}},[]]]]' ;;
  tag) echo "Unable to acquire database write lock: Resource temporarily unavailable" >&2; exit 1 ;;
  *) exit 1 ;;
esac
"##;

#[test]
#[serial]
fn test_write_lock_contention_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let gateway = cli_gateway(&temp_dir, WRITE_LOCKED);

    // Reads still work
    let record = gateway.get_by_id("<a@example.com>").unwrap().unwrap();
    assert_eq!(record.thread_id, "0000000000000001");
    assert_eq!(record.tags, ["inbox"]);

    let err = gateway.tag_by_id("<a@example.com>", "archived").unwrap_err();
    match err {
        MailgateError::BackendUnavailable(ref diagnostic) => {
            assert!(diagnostic.contains("write lock"), "{diagnostic}")
        }
        ref other => panic!("Expected BackendUnavailable, got {other:?}"),
    }
    assert!(err.is_unavailable());
}

const BULK_MAILBOX: &str = r##"#!/bin/sh
state="@STATE@"
echo "$*" >> "$state/calls"
last=""
for arg in "$@"; do last="$arg"; done
case "$1" in
  count) echo 120 ;;
  search)
    case "$*" in
      *--output=summary*) echo '[{"thread":"0000000000000001","query":[null,null]}]' ;;
      *)
        offset=0
        limit=120
        for arg in "$@"; do
          case "$arg" in
            --offset=*) offset="${arg#--offset=}" ;;
            --limit=*) limit="${arg#--limit=}" ;;
          esac
        done
        end=$((offset + limit))
        if [ "$end" -gt 120 ]; then end=120; fi
        out=""
        i=$offset
        while [ "$i" -lt "$end" ]; do
          out="$out,\"m$i@example.com\""
          i=$((i + 1))
        done
        echo "[${out#,}]" ;;
    esac ;;
  show)
    out=""
    for word in $last; do
      case "$word" in
        id:*)
          id=$(echo "${word#id:}" | tr -d '"')
          out="$out,[[{\"id\":\"$id\",\"timestamp\":1600000000,\"tags\":[\"bulk\"],\"filename\":[\"/mail/cur/$id\"],\"headers\":{\"Subject\":\"Bulk $id\"}},[]]]" ;;
      esac
    done
    echo "[${out#,}]" ;;
  *) exit 0 ;;
esac
"##;

#[test]
#[serial]
fn test_search_reads_only_the_pages_it_needs() {
    let temp_dir = TempDir::new().unwrap();
    let gateway = cli_gateway(&temp_dir, BULK_MAILBOX);

    let params = SearchParameters::new("tag:bulk", 60, SortOrder::NewestFirst).unwrap();
    let results = gateway.search(&params).unwrap();

    assert_eq!(results.count, 120);
    assert_eq!(results.results.len(), 60);
    assert_eq!(results.results[0].message_id, "m0@example.com");
    assert_eq!(results.results[59].message_id, "m59@example.com");
    assert_eq!(results.results[0].thread_id, "0000000000000001");
    assert_eq!(results.results[0].subject, "Bulk m0@example.com");

    let calls = fs::read_to_string(temp_dir.path().join("calls")).unwrap();
    let id_pages: Vec<&str> = calls
        .lines()
        .filter(|call| call.contains("--output=messages") && call.starts_with("search"))
        .collect();
    assert_eq!(id_pages.len(), 2, "{calls}");
    assert!(id_pages[0].contains("--offset=0"));
    assert!(id_pages[1].contains("--offset=50"));

    // One show per page of records, not one per message
    let shows = calls.lines().filter(|call| call.starts_with("show")).count();
    assert_eq!(shows, 2, "{calls}");
}

//! Event Tests
//!
//! Tests for the event lifecycle and the published record shapes.

use std::io::Cursor;
use std::time::Duration;

use resptap::event::{CommandRecord, OperationType, QueryEvent, QueryRecord};
use resptap::protocol::{read_command, read_response, Command, Response};
use resptap::CommandEvent;

fn command(input: &[u8]) -> Command {
    read_command(&mut Cursor::new(input.to_vec())).unwrap()
}

fn response(input: &[u8]) -> Response {
    read_response(&mut Cursor::new(input.to_vec())).unwrap()
}

// =============================================================================
// CommandEvent Lifecycle
// =============================================================================

#[test]
fn test_begin_captures_command() {
    let cmd = command(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    let event = CommandEvent::begin(&cmd, 2);

    assert_eq!(event.operation(), "SET");
    assert_eq!(event.arguments_display(), "k v");
    assert_eq!(event.raw_request(), &cmd.raw);
    assert_eq!(event.db(), 2);
    assert_eq!(event.duration(), None);
    assert_eq!(event.response_summary(), None);
    assert!(!event.is_complete());
    assert!(!event.is_error());
}

#[test]
fn test_complete_with_success() {
    let cmd = command(b"GET foo\r\n");
    let begun = CommandEvent::begin(&cmd, 0);
    let started = begun.timestamp_start();

    let done = begun.complete(&response(b"$3\r\nbar\r\n"), Duration::from_micros(250));

    assert!(done.is_complete());
    assert!(!done.is_error());
    assert_eq!(done.response_summary(), Some("bar"));
    assert_eq!(done.duration(), Some(Duration::from_micros(250)));
    assert_eq!(done.timestamp_start(), started);
}

#[test]
fn test_complete_with_error_reply() {
    let cmd = command(b"INCR k\r\n");
    let done = CommandEvent::begin(&cmd, 0).complete(
        &response(b"-WRONGTYPE Operation against a key\r\n"),
        Duration::from_millis(1),
    );

    assert!(done.is_error());
    assert_eq!(done.error_message(), Some("WRONGTYPE Operation against a key"));
    assert_eq!(
        done.response_summary(),
        Some("WRONGTYPE Operation against a key")
    );
}

#[test]
fn test_fail_sets_error_without_response() {
    let cmd = command(b"PING\r\n");
    let done = CommandEvent::begin(&cmd, 0).fail("Connection closed by peer", Duration::from_millis(3));

    assert!(done.is_complete());
    assert_eq!(done.error_message(), Some("Connection closed by peer"));
    assert_eq!(done.response_summary(), None);
}

#[test]
fn test_begin_shares_argument_buffers() {
    let cmd = command(b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n");
    let event = CommandEvent::begin(&cmd, 0);

    // Same backing storage, not a copy
    assert_eq!(event.arguments()[0].as_ptr(), cmd.args[0].as_ptr());
}

// =============================================================================
// CommandRecord
// =============================================================================

#[test]
fn test_record_field_names() {
    let cmd = command(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    let done = CommandEvent::begin(&cmd, 4).complete(&response(b"$-1\r\n"), Duration::from_nanos(1500));

    let value = serde_json::to_value(&done).unwrap();
    let object = value.as_object().unwrap();

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["args", "command", "db", "duration", "error", "raw", "response", "timestamp"]
    );

    assert_eq!(value["command"], "GET");
    assert_eq!(value["args"], serde_json::json!(["foo"]));
    assert_eq!(value["raw"], "*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
    assert_eq!(value["duration"], 1500);
    assert_eq!(value["error"], "");
    assert_eq!(value["response"], "(nil)");
    assert_eq!(value["db"], 4);
}

#[test]
fn test_record_round_trips_through_json() {
    let cmd = command(b"DEL a b\r\n");
    let done = CommandEvent::begin(&cmd, 0).complete(&response(b":2\r\n"), Duration::from_millis(2));

    let json = serde_json::to_string(&done).unwrap();
    let record: CommandRecord = serde_json::from_str(&json).unwrap();

    assert_eq!(record, done.record());
    assert_eq!(record.args, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(record.duration, 2_000_000);
    assert_eq!(record.timestamp, done.timestamp_start());
}

#[test]
fn test_record_timestamp_is_rfc3339() {
    let cmd = command(b"PING\r\n");
    let event = CommandEvent::begin(&cmd, 0);

    let value = serde_json::to_value(event.record()).unwrap();
    let timestamp = value["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[test]
fn test_record_of_pending_event() {
    let cmd = command(b"PING\r\n");
    let record = CommandEvent::begin(&cmd, 0).record();

    assert_eq!(record.duration, 0);
    assert_eq!(record.response, "");
    assert_eq!(record.error, "");
}

#[test]
fn test_record_is_lossy_for_binary_arguments() {
    let mut input = b"*2\r\n$3\r\nSET\r\n$2\r\n".to_vec();
    input.extend_from_slice(&[0xFF, b'a']);
    input.extend_from_slice(b"\r\n");

    let record = CommandEvent::begin(&command(&input), 0).record();
    assert_eq!(record.args, vec!["\u{FFFD}a".to_string()]);
}

// =============================================================================
// QueryEvent
// =============================================================================

#[test]
fn test_query_event_lifecycle() {
    let begun = QueryEvent::begin(OperationType::Execute, "SELECT * FROM t WHERE id = ?", "app")
        .with_args(vec![serde_json::json!(7)]);

    assert_eq!(begun.operation_type(), OperationType::Execute);
    assert_eq!(begun.database(), "app");
    assert_eq!(begun.duration(), None);

    let done = begun.complete(3, Duration::from_millis(5));
    assert_eq!(done.row_count(), 3);
    assert_eq!(done.error(), None);
    assert_eq!(done.args(), &[serde_json::json!(7)]);
}

#[test]
fn test_query_event_failure() {
    let done = QueryEvent::begin(OperationType::Query, "SELEC 1", "")
        .fail("You have an error in your SQL syntax", Duration::from_millis(1));

    assert_eq!(done.error(), Some("You have an error in your SQL syntax"));
    assert_eq!(done.row_count(), 0);
}

#[test]
fn test_query_record_uses_type_field() {
    let done = QueryEvent::begin(OperationType::UseDb, "app", "app").complete(0, Duration::from_nanos(10));

    let value = serde_json::to_value(&done).unwrap();
    assert_eq!(value["type"], "use_db");
    assert!(value.get("operation_type").is_none());
    assert_eq!(value["duration"], 10);
    assert_eq!(value["row_count"], 0);

    let record: QueryRecord = serde_json::from_value(value).unwrap();
    assert_eq!(record, done.record());
}

#[test]
fn test_operation_type_names() {
    assert_eq!(OperationType::FieldList.to_string(), "field_list");
    assert_eq!(OperationType::Prepare.as_str(), "prepare");
    assert_eq!(
        serde_json::to_string(&OperationType::Other).unwrap(),
        "\"other\""
    );
}

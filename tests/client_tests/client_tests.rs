//! Client Tests
//!
//! End-to-end tests of every operation against the in-process fake server.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use common::{scripted, FakeServer};
use gibson::protocol::{
    decode_key_value_set, encode_key_value_set, Command, Opcode, Reply, ReplyShape, Status,
};
use gibson::{
    Client, Config, ConnectionPool, Encoding, ErrorKind, GibsonError, KeyValueSet, MetaField,
    ProtocolVariant, Response, Value,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn connected() -> (FakeServer, Client) {
    let server = FakeServer::start(ProtocolVariant::Encoded);
    let client = Client::open(server.config()).unwrap();
    (server, client)
}

/// Deterministic 16-byte digest-like key with spaces replaced
fn digest_key(seed: u64) -> [u8; 16] {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut key = [0u8; 16];
    for byte in key.iter_mut() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        *byte = (state >> 56) as u8;
        if *byte == b' ' {
            *byte = b'_';
        }
    }
    key
}

fn reply_code(err: &GibsonError) -> Option<u16> {
    err.reply_code()
}

// =============================================================================
// Single Key Tests
// =============================================================================

#[test]
fn test_set_get_round_trip() {
    let (_server, mut client) = connected();

    let stored = client.set("foo", "bar", 0).unwrap();
    assert_eq!(stored, b"bar");
    assert_eq!(client.get("foo").unwrap(), b"bar");
}

#[test]
fn test_binary_values_round_trip() {
    let (_server, mut client) = connected();

    let values: Vec<Vec<u8>> = vec![
        vec![0x00],
        b"with spaces inside".to_vec(),
        vec![b' ', b' ', 0x00, b' '],
        (0..=255).collect(),
        Vec::new(),
    ];

    for (i, value) in values.iter().enumerate() {
        let key = format!("bin:{}", i);
        client.set(&key, value, 0).unwrap();
        assert_eq!(client.get(&key).unwrap(), value.as_slice(), "value {}", i);
    }
}

#[test]
fn test_binary_digest_keys() {
    let (_server, mut client) = connected();

    for seed in 0..64u64 {
        let key = digest_key(seed);
        client.set(key, format!("value-{}", seed), 0).unwrap();
    }
    for seed in 0..64u64 {
        let key = digest_key(seed);
        let expected = format!("value-{}", seed);
        assert_eq!(client.get(key).unwrap(), expected.as_bytes());
    }
}

#[test]
fn test_key_with_space_is_rejected_locally() {
    let (server, mut client) = connected();

    let err = client.set("foo bar", "v", 0).unwrap_err();
    assert!(matches!(err, GibsonError::InvalidArgument(_)));
    assert_eq!(client.last_error_kind(), Some(ErrorKind::Usage));

    // Nothing was sent; the connection is still fine
    assert!(client.is_connected());
    client.ping().unwrap();
    assert_eq!(server.accepted(), 1);
}

#[test]
fn test_get_missing_key() {
    let (_server, mut client) = connected();

    let err = client.get("missing").unwrap_err();
    assert_eq!(reply_code(&err), Some(1));
    assert_eq!(client.last_error(), "Invalid key, item not found");
}

#[test]
fn test_inc_dec_numeric_semantics() {
    let (_server, mut client) = connected();

    client.set("counter", "1", 0).unwrap();
    assert_eq!(client.inc("counter").unwrap(), 2i64);
    assert_eq!(client.get("counter").unwrap(), Value::Number(2));

    assert_eq!(client.dec("counter").unwrap(), 1i64);
    assert_eq!(client.dec("counter").unwrap(), 0i64);
    assert_eq!(client.dec("counter").unwrap(), Value::Number(-1));
}

#[test]
fn test_legacy_inc_dec_decode_numbers() {
    let server = FakeServer::start(ProtocolVariant::Legacy);
    let mut client = Client::open(server.config()).unwrap();

    client.set("counter", "1", 0).unwrap();
    assert_eq!(client.inc("counter").unwrap(), 2i64);
    assert_eq!(client.inc("counter").unwrap(), Value::Number(3));
    assert_eq!(client.dec("counter").unwrap(), 2i64);
}

#[test]
fn test_untagged_counter_reply_is_binary_integer() {
    let reply = Reply {
        status: Status::Value.code(),
        encoding: None,
        payload: Bytes::copy_from_slice(&7i64.to_le_bytes()),
    };
    let response = Response::decode(ReplyShape::Counter, reply, ProtocolVariant::Legacy).unwrap();

    assert_eq!(response, Response::Value(Value::Number(7)));
}

#[test]
fn test_inc_non_numeric_fails() {
    let (_server, mut client) = connected();

    client.set("word", "bar", 0).unwrap();
    let err = client.inc("word").unwrap_err();

    assert_eq!(reply_code(&err), Some(2));
    assert_eq!(client.last_error(), "Invalid value, not a number");
    assert_eq!(client.get("word").unwrap(), b"bar");
}

#[test]
fn test_del() {
    let (_server, mut client) = connected();

    client.set("doomed", "x", 0).unwrap();
    client.del("doomed").unwrap();

    assert!(client.get("doomed").is_err());
    assert!(client.del("doomed").is_err());
}

#[test]
fn test_ttl_expiry() {
    let (_server, mut client) = connected();

    client.set("short", "lived", 1).unwrap();
    assert_eq!(client.get("short").unwrap(), b"lived");

    thread::sleep(Duration::from_millis(1_200));

    let err = client.get("short").unwrap_err();
    assert_eq!(reply_code(&err), Some(1));
}

#[test]
fn test_ttl_on_existing_key() {
    let (_server, mut client) = connected();

    client.set("k", "v", 0).unwrap();
    client.ttl("k", 100).unwrap();
    assert_eq!(client.meta("k", MetaField::Ttl).unwrap(), 100);

    assert!(client.ttl("missing", 10).is_err());
}

#[test]
fn test_lock_mutual_exclusion() {
    let (_server, mut client) = connected();

    client.set("locked", "v", 0).unwrap();
    client.lock("locked", 10).unwrap();

    let err = client.lock("locked", 10).unwrap_err();
    assert_eq!(reply_code(&err), Some(4));
    assert_eq!(client.last_error(), "The item is locked");

    assert!(client.set("locked", "new", 0).is_err());
    assert!(client.del("locked").is_err());
    assert_eq!(client.get("locked").unwrap(), b"v");

    client.unlock("locked").unwrap();
    client.set("locked", "new", 0).unwrap();
    assert_eq!(client.get("locked").unwrap(), b"new");
}

#[test]
fn test_large_value_integrity() {
    let (_server, mut client) = connected();

    let big = vec![b'a'; 1_000_000];
    client.set("big", &big, 0).unwrap();

    let value = client.get("big").unwrap();
    let bytes = value.as_bytes().unwrap();
    assert_eq!(bytes.len(), 1_000_000);
    assert!(bytes.iter().all(|&b| b == b'a'));
}

#[test]
fn test_meta_fields() {
    let (_server, mut client) = connected();

    client.set("plain", "bar", 0).unwrap();
    client.set("number", "1", 0).unwrap();
    client.inc("number").unwrap();
    client.set("packed", vec![b'a'; 50_000], 0).unwrap();

    assert_eq!(client.meta("plain", MetaField::Encoding).unwrap(), Encoding::Plain as i64);
    assert_eq!(client.meta("number", MetaField::Encoding).unwrap(), Encoding::Number as i64);
    assert_eq!(client.meta("packed", MetaField::Encoding).unwrap(), Encoding::Compressed as i64);

    assert_eq!(client.meta("plain", MetaField::Size).unwrap(), 3);
    assert_eq!(client.meta("plain", MetaField::Ttl).unwrap(), -1);
    assert_eq!(client.meta("plain", MetaField::Lock).unwrap(), 0);
    assert!(client.meta("plain", MetaField::Created).unwrap() > 0);

    client.lock("plain", 30).unwrap();
    assert_eq!(client.meta("plain", MetaField::Lock).unwrap(), 30);
}

// =============================================================================
// Prefix Tests
// =============================================================================

#[test]
fn test_mget_returns_inserted_set() {
    let (_server, mut client) = connected();

    let mut expected = KeyValueSet::new();
    for (key, value) in [("app:a", "1x"), ("app:b", "two"), ("app:c", "three")] {
        client.set(key, value, 0).unwrap();
        expected.push(Bytes::from(key), Value::from(value.as_bytes().to_vec()));
    }
    client.set("other", "no", 0).unwrap();

    let set = client.mget("app:").unwrap();
    assert_eq!(set, expected);

    // Decoding the same bytes again gives the same set
    let raw = encode_key_value_set(&set, ProtocolVariant::Encoded);
    let again = decode_key_value_set(raw.clone(), ProtocolVariant::Encoded).unwrap();
    assert_eq!(again, decode_key_value_set(raw, ProtocolVariant::Encoded).unwrap());
    assert_eq!(again, expected);
}

#[test]
fn test_mget_carries_numbers() {
    let (_server, mut client) = connected();

    client.set("n:a", "1", 0).unwrap();
    client.set("n:b", "5", 0).unwrap();
    assert_eq!(client.minc("n:").unwrap(), 2);

    let set = client.mget("n:").unwrap();
    assert_eq!(set.get(b"n:a").unwrap(), &Value::Number(2));
    assert_eq!(set.get(b"n:b").unwrap(), &Value::Number(6));
    assert_eq!(client.get("n:a").unwrap(), 2i64);
}

#[test]
fn test_mget_no_match() {
    let (_server, mut client) = connected();

    let err = client.mget("nothing:").unwrap_err();
    assert_eq!(reply_code(&err), Some(1));
}

#[test]
fn test_prefix_counts() {
    let (_server, mut client) = connected();

    for i in 0..5 {
        client.set(format!("p:{}", i), "0", 0).unwrap();
    }
    client.set("q:0", "0", 0).unwrap();

    assert_eq!(client.count("p:").unwrap(), 5);
    assert_eq!(client.mset("p:", "7").unwrap(), 5);
    assert_eq!(client.get("p:3").unwrap(), b"7");

    assert_eq!(client.mdec("p:").unwrap(), 5);
    assert_eq!(client.get("p:3").unwrap(), 6i64);

    assert_eq!(client.mttl("p:", 100).unwrap(), 5);
    assert_eq!(client.meta("p:0", MetaField::Ttl).unwrap(), 100);

    assert_eq!(client.mlock("p:", 10).unwrap(), 5);
    assert!(client.set("p:0", "x", 0).is_err());
    assert_eq!(client.munlock("p:").unwrap(), 5);
    client.set("p:0", "x", 0).unwrap();

    assert_eq!(client.mdel("p:").unwrap(), 5);
    assert_eq!(client.count("p:").unwrap(), 0);
    assert_eq!(client.count("q:").unwrap(), 1);
}

#[test]
fn test_keys_in_order() {
    let (_server, mut client) = connected();

    for key in ["k:c", "k:a", "k:b", "z"] {
        client.set(key, "v", 0).unwrap();
    }

    let keys = client.keys("k:").unwrap();
    let keys: Vec<&[u8]> = keys.iter().map(|k| k.as_ref()).collect();
    assert_eq!(keys, vec![&b"k:a"[..], &b"k:b"[..], &b"k:c"[..]]);
}

// =============================================================================
// Administrative Tests
// =============================================================================

#[test]
fn test_stats() {
    let (_server, mut client) = connected();

    client.set("a", "12345", 0).unwrap();
    let stats = client.stats().unwrap();

    for field in ["server_version", "server_started", "total_items", "memory_used"] {
        assert!(stats.contains_key(field.as_bytes()), "missing {}", field);
    }
    assert_eq!(stats.get(b"total_items").and_then(Value::as_number), Some(1));
    assert_eq!(stats.get(b"memory_used").and_then(Value::as_number), Some(5));
}

#[test]
fn test_ping_and_execute() {
    let (_server, mut client) = connected();

    client.ping().unwrap();

    let cmd = Command::new(Opcode::Set, b"raw", Some(b"value")).unwrap();
    let response = client.execute(cmd).unwrap();
    assert_eq!(response, Response::Value(Value::from(b"value".to_vec())));

    let cmd = Command::new(Opcode::Count, b"raw", None).unwrap();
    assert_eq!(client.execute(cmd).unwrap(), Response::Number(1));
}

#[test]
fn test_legacy_rejects_newer_operations() {
    let server = FakeServer::start(ProtocolVariant::Legacy);
    let mut client = Client::open(server.config()).unwrap();

    let err = client.ping().unwrap_err();
    assert!(matches!(
        err,
        GibsonError::Unsupported {
            opcode: Opcode::Ping,
            variant: ProtocolVariant::Legacy
        }
    ));
    assert!(client.is_connected());

    client.set("k", "v", 0).unwrap();
    assert_eq!(client.get("k").unwrap(), b"v");
    assert!(client.keys("k").is_err());
    assert!(client.meta("k", MetaField::Size).is_err());
}

// =============================================================================
// Error State Tests
// =============================================================================

#[test]
fn test_last_error_defaults_and_updates() {
    let (_server, mut client) = connected();
    assert_eq!(client.last_error(), "no error");
    assert_eq!(client.last_error_kind(), None);

    client.get("missing").unwrap_err();
    assert_eq!(client.last_error_kind(), Some(ErrorKind::Reply(1)));

    // A success does not clear the previous failure
    client.set("k", "v", 0).unwrap();
    assert_eq!(client.last_error_kind(), Some(ErrorKind::Reply(1)));
}

#[test]
fn test_last_error_is_per_client() {
    let server = FakeServer::start(ProtocolVariant::Encoded);
    let mut a = Client::open(server.config()).unwrap();
    let mut b = Client::open(server.config()).unwrap();

    a.get("missing").unwrap_err();

    assert_eq!(a.last_error(), "Invalid key, item not found");
    assert_eq!(b.last_error(), "no error");
    b.ping().unwrap();
}

#[test]
fn test_unconnected_client_fails_fast() {
    let mut client = Client::new(Config::default());

    let err = client.get("foo").unwrap_err();
    assert!(matches!(err, GibsonError::Disconnected));
    assert_eq!(client.last_error(), "Not connected to a Gibson server");
}

#[test]
fn test_truncated_reply_disconnects_client() {
    let mut raw = vec![0x06, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00];
    raw.extend_from_slice(b"part");
    let config = Config::builder().address(scripted(raw)).read_timeout_ms(5_000).build();

    let mut client = Client::open(config).unwrap();
    let err = client.get("k").unwrap_err();

    assert!(matches!(err, GibsonError::Io(_)));
    assert_eq!(client.last_error_kind(), Some(ErrorKind::Transport));
    assert!(!client.is_connected());
    assert!(matches!(client.get("k"), Err(GibsonError::Disconnected)));
}

#[test]
fn test_transport_error_survives_skipped_quit() {
    let raw = vec![0x06, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00];
    let config = Config::builder().address(scripted(raw)).read_timeout_ms(5_000).build();

    let mut client = Client::open(config).unwrap();
    client.get("k").unwrap_err();
    let reason = client.last_error();

    assert_eq!(reason, "Connection closed or I/O failure");
    assert!(!client.is_connected());

    // Ending a dead session reports Disconnected and replaces the reason
    assert!(matches!(client.quit(), Err(GibsonError::Disconnected)));
    assert_eq!(client.last_error(), "Not connected to a Gibson server");
    assert_ne!(client.last_error(), reason);
}

#[test]
fn test_malformed_key_value_set_is_decode_error() {
    // KVAL reply claiming two elements but carrying none
    let raw = vec![0x07, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];
    let config = Config::builder().address(scripted(raw)).read_timeout_ms(5_000).build();

    let mut client = Client::open(config).unwrap();
    let err = client.mget("p").unwrap_err();

    assert!(matches!(err, GibsonError::Protocol(_)));
    assert_eq!(client.last_error(), "Malformed reply from server");
}

#[test]
fn test_out_of_memory_status() {
    let raw = vec![0x03, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
    let config = Config::builder().address(scripted(raw)).read_timeout_ms(5_000).build();

    let mut client = Client::open(config).unwrap();
    client.set("k", "v", 0).unwrap_err();

    assert_eq!(client.last_error(), "Gibson server is out of memory");
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_quit_closes_connection() {
    let (_server, mut client) = connected();

    client.quit().unwrap();
    assert!(!client.is_connected());

    let err = client.set("foo", "bar", 0).unwrap_err();
    assert!(matches!(err, GibsonError::Disconnected));

    client.connect().unwrap();
    client.set("foo", "bar", 0).unwrap();
}

#[test]
fn test_repeated_pconnect_reuses_one_socket() {
    let server = FakeServer::start(ProtocolVariant::Encoded);
    let pool = Arc::new(ConnectionPool::new());
    let mut client = Client::new(server.config());

    for _ in 0..30 {
        client.pconnect_with(Arc::clone(&pool)).unwrap();
    }
    assert_eq!(server.accepted(), 1);

    client.quit().unwrap();
    assert!(client.set("foo", "bar", 0).is_err());

    client.pconnect_with(Arc::clone(&pool)).unwrap();
    client.set("foo", "bar", 0).unwrap();
    assert_eq!(server.accepted(), 2);

    client.quit().unwrap();
}

#[test]
fn test_global_pool_pconnect() {
    let server = FakeServer::start(ProtocolVariant::Encoded);

    {
        let mut client = Client::open_persistent(server.config()).unwrap();
        client.set("global", "1", 0).unwrap();
    }

    let mut client = Client::open_persistent(server.config()).unwrap();
    assert_eq!(client.get("global").unwrap(), b"1");
    assert_eq!(server.accepted(), 1);
}

#[test]
fn test_concurrent_clients_are_independent() {
    let server = FakeServer::start(ProtocolVariant::Encoded);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let config = server.config();
            thread::spawn(move || {
                let mut client = Client::open(config).unwrap();
                for i in 0..25 {
                    let key = format!("t{}:{}", t, i);
                    client.set(&key, &key, 0).unwrap();
                    assert_eq!(client.get(&key).unwrap(), key.as_bytes());
                }
                client.count(format!("t{}:", t)).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 25);
    }
}

#[cfg(unix)]
#[test]
fn test_unix_socket_client() {
    let server = FakeServer::start_unix(ProtocolVariant::Encoded);
    let mut client = Client::open(server.config()).unwrap();

    client.set("sock", "et", 0).unwrap();
    assert_eq!(client.get("sock").unwrap(), b"et");
}

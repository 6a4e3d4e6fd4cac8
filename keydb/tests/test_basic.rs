use std::time::Duration;

use keydb::{cmd, Client, Commands, Config, ConnectionLike, ErrorKind, Value};

mod support;
use support::TestServer;

#[test]
fn ping_and_roundtrip() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    assert_eq!(con.ping().unwrap(), "PONG");

    let _: () = con.set("my_key", 42).unwrap();
    assert_eq!(cmd("GET").arg("my_key").query(&mut con), Ok(42));
    let raw: Value = con.get("my_key").unwrap();
    assert_eq!(raw, Value::BulkString(b"42".to_vec()));
}

#[test]
fn get_of_missing_key_is_nil() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let missing: Option<String> = con.get("no_such_key").unwrap();
    assert_eq!(missing, None);
}

#[test]
fn unknown_command_surfaces_as_response_error() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let err = cmd("INVALIDCMD").query::<Value>(&mut con).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResponseError);

    // an error reply does not desynchronize the connection
    assert!(con.is_open());
    assert_eq!(con.ping().unwrap(), "PONG");
}

#[test]
fn empty_command_is_an_encoding_error() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let err = con.req_command(&keydb::Cmd::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncodingError);
}

#[test]
fn read_timeout_breaks_the_connection() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();
    con.set_read_timeout(Some(Duration::from_millis(50))).unwrap();

    let err = cmd("HANG").query::<Value>(&mut con).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // a timeout mid round trip leaves the stream position unknown, so the
    // connection must not be reused
    assert!(!con.is_open());
}

#[test]
fn client_executes_over_the_pool() {
    let server = TestServer::new();
    let client = Client::open_with_config(
        server.url(),
        Config {
            timeout: Some(Duration::from_secs(5)),
            ..Config::default()
        },
    )
    .unwrap();

    let reply = client.execute(cmd("SET").arg("pooled").arg("yes")).unwrap();
    assert_eq!(reply, Value::Okay);
    let reply = client.execute(cmd("GET").arg("pooled")).unwrap();
    assert_eq!(reply, Value::BulkString(b"yes".to_vec()));

    // both round trips reused the single pooled connection
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.pool_state().connections, 1);
    assert_eq!(client.pool_state().idle, 1);
}

#[test]
fn client_is_usable_from_multiple_threads() {
    let server = TestServer::new();
    let client = Client::open_with_config(
        server.url(),
        Config {
            timeout: Some(Duration::from_secs(5)),
            max_pool_size: 4,
            ..Config::default()
        },
    )
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let mut client = client.clone();
            std::thread::spawn(move || {
                for j in 0..10 {
                    let key = format!("key_{i}");
                    let _: () = client.set(key.as_str(), j).unwrap();
                    let got: i64 = client.get(key.as_str()).unwrap();
                    assert_eq!(got, j);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let state = client.pool_state();
    assert!(state.connections <= 4);
    assert_eq!(state.connections, state.idle);
}

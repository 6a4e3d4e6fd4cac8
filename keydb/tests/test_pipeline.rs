use keydb::{pipe, Client, Commands, ErrorKind, Value};

mod support;
use support::TestServer;

#[test]
fn pipelined_commands_succeed_or_fail_independently() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let mut pipe = pipe();
    pipe.cmd("SET").arg("a").arg(1);
    pipe.cmd("INVALIDCMD");
    pipe.cmd("SET").arg("b").arg(2);
    let replies = pipe.execute(&mut con).unwrap();

    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0], Value::Okay);
    assert!(matches!(replies[1], Value::ServerError(_)));
    assert_eq!(replies[2], Value::Okay);

    // the failing middle command did not keep its neighbors from applying
    let a: i64 = con.get("a").unwrap();
    let b: i64 = con.get("b").unwrap();
    assert_eq!((a, b), (1, 2));
}

#[test]
fn transactional_pipeline_rolls_back_as_a_unit() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let mut pipe = pipe();
    pipe.atomic();
    pipe.cmd("SET").arg("a").arg(1);
    pipe.cmd("INVALIDCMD");
    pipe.cmd("SET").arg("b").arg(2);
    let err = pipe.execute(&mut con).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransactionAborted);
    let queued = err.aborted_replies().unwrap();
    assert_eq!(queued.len(), 3);
    assert_eq!(queued[0], Value::SimpleString("QUEUED".to_string()));
    assert!(matches!(queued[1], Value::ServerError(_)));

    // none of the batch took effect
    let a: Option<i64> = con.get("a").unwrap();
    let b: Option<i64> = con.get("b").unwrap();
    assert_eq!((a, b), (None, None));
}

#[test]
fn successful_transaction_returns_replies_in_order() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let mut pipe = pipe();
    pipe.atomic();
    pipe.cmd("SET").arg("x").arg(7).ignore();
    pipe.cmd("GET").arg("x");
    let replies = pipe.execute(&mut con).unwrap();

    assert_eq!(replies, vec![Value::BulkString(b"7".to_vec())]);
}

#[test]
fn typed_query_over_a_pipeline() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let (a, b): (i64, i64) = pipe()
        .cmd("SET").arg("k1").arg(42).ignore()
        .cmd("SET").arg("k2").arg(43).ignore()
        .cmd("GET").arg("k1")
        .cmd("GET").arg("k2")
        .query(&mut con)
        .unwrap();
    assert_eq!((a, b), (42, 43));
}

#[test]
fn execute_discards_the_buffer_on_success() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let mut pipe = pipe();
    pipe.cmd("SET").arg("once").arg(1);
    pipe.execute(&mut con).unwrap();
    assert!(pipe.is_empty());

    // an executed pipeline is back in building state and can be refilled
    pipe.cmd("GET").arg("once");
    let replies = pipe.execute(&mut con).unwrap();
    assert_eq!(replies, vec![Value::BulkString(b"1".to_vec())]);
}

#[test]
fn client_pipeline_honors_transaction_default() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();

    // transaction on by default, like the pipelines of the upstream client
    assert!(client.pipeline().is_atomic());

    let config = keydb::Config {
        use_transaction_by_default: false,
        ..keydb::Config::default()
    };
    let client = Client::open_with_config(server.url(), config).unwrap();
    assert!(!client.pipeline().is_atomic());
}

#[test]
fn empty_pipeline_executes_to_no_replies() {
    let server = TestServer::new();
    let client = Client::open(server.url()).unwrap();
    let mut con = client.get_connection().unwrap();

    let replies = pipe().execute(&mut con).unwrap();
    assert!(replies.is_empty());
}

use keydb::{cmd, pipe, Commands, ErrorKind, ExpireUnit, Nested, Value};
use keydb_test::{MockCmd, MockKeydbConnection};

#[test]
fn expiremember_sends_key_subkey_delay() {
    let mut conn = MockKeydbConnection::new(vec![MockCmd::new(
        cmd("EXPIREMEMBER").arg("fruits").arg("orange").arg(30),
        Ok(1),
    )]);

    assert_eq!(conn.expiremember("fruits", "orange", 30).unwrap(), 1);
    assert!(conn.is_empty());
}

#[test]
fn expiremember_with_unit_appends_the_unit_token() {
    let mut conn = MockKeydbConnection::new(vec![MockCmd::new(
        cmd("EXPIREMEMBER").arg("fruits").arg("orange").arg(30).arg("ms"),
        Ok(1),
    )]);

    assert_eq!(
        conn.expiremember_in("fruits", "orange", 30, ExpireUnit::Milliseconds)
            .unwrap(),
        1
    );
    assert!(conn.is_empty());
}

#[test]
fn expirememberat_sends_an_absolute_timestamp() {
    let mut conn = MockKeydbConnection::new(vec![MockCmd::new(
        cmd("EXPIREMEMBERAT").arg("fruits").arg("orange").arg(1712345678),
        Ok(1),
    )]);

    assert_eq!(
        conn.expirememberat("fruits", "orange", 1712345678).unwrap(),
        1
    );
    assert!(conn.is_empty());
}

#[test]
fn nhget_addresses_by_dotted_path() {
    let mut conn = MockKeydbConnection::new(vec![MockCmd::new(
        cmd("NHGET").arg("user:1.profile.name"),
        Ok("ada"),
    )]);

    assert_eq!(
        conn.nhget("user:1.profile.name").unwrap(),
        Value::BulkString(b"ada".to_vec())
    );
    assert!(conn.is_empty());
}

fn expected_nhset_pipeline() -> MockCmd {
    MockCmd::with_values(
        pipe()
            .cmd("NHSET").arg("r.x.y").arg("1")
            .cmd("NHSET").arg("r.x.z").arg("2"),
        Ok(vec![Value::Okay, Value::Okay]),
    )
}

#[test]
fn nhset_flattens_a_nested_mapping_into_leaf_writes() {
    let mut conn = MockKeydbConnection::new(vec![expected_nhset_pipeline()]);

    let value = Nested::node().with("x", Nested::node().with("y", 1).with("z", 2));
    let replies = conn.nhset("r", &value).unwrap();
    assert_eq!(replies, vec![Value::Okay, Value::Okay]);
    assert!(conn.is_empty());
}

#[test]
fn flat_and_nested_forms_produce_identical_writes() {
    // both inputs describe the same two leaves, so the mock sees the very
    // same pipeline bytes for both forms
    let mut conn = MockKeydbConnection::new(vec![expected_nhset_pipeline()]);
    let value = Nested::node().with("x", Nested::node().with("y", 1).with("z", 2));
    conn.nhset("r", &value).unwrap();
    assert!(conn.is_empty());

    let mut conn = MockKeydbConnection::new(vec![expected_nhset_pipeline()]);
    conn.nhset_flat(&[("r.x.y", 1), ("r.x.z", 2)]).unwrap();
    assert!(conn.is_empty());
}

#[test]
fn nhset_of_an_empty_node_writes_nothing() {
    let mut conn = MockKeydbConnection::new(vec![]);
    let replies = conn.nhset("r", &Nested::node()).unwrap();
    assert!(replies.is_empty());
}

#[test]
fn nhset_flat_rejects_multi_argument_leaves() {
    let mut conn = MockKeydbConnection::new(vec![]);
    let err = conn
        .nhset_flat(&[("r.a", vec!["two", "args"])])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncodingError);
}

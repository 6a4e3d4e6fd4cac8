//! Testing support
//!
//! This crate provides `MockKeydbConnection` which implements
//! `ConnectionLike` and can be used in the same place as any other type
//! that behaves like a connection.  This is useful for writing unit tests
//! without needing a KeyDB server.
//!
//! # Example
//!
//! ```rust
//! use keydb::{ConnectionLike, KeydbError};
//! use keydb_test::{MockCmd, MockKeydbConnection};
//!
//! fn my_exists<C: ConnectionLike>(conn: &mut C, key: &str) -> Result<bool, KeydbError> {
//!     let exists: bool = keydb::cmd("EXISTS").arg(key).query(conn)?;
//!     Ok(exists)
//! }
//!
//! let mut mock_connection = MockKeydbConnection::new(vec![
//!     MockCmd::new(keydb::cmd("EXISTS").arg("foo"), Ok("1")),
//! ]);
//!
//! let result = my_exists(&mut mock_connection, "foo").unwrap();
//! assert_eq!(result, true);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use keydb::{
    Cmd, ConnectionLike, ErrorKind, KeydbError, KeydbResult, Pipeline, ServerError, Value,
};

/// Helper trait for converting test values into a `keydb::Value` returned
/// from a `MockKeydbConnection`. This is necessary because neither
/// `ToKeydbArgs` nor `FromKeydbValue` performs the precise conversion
/// needed.
pub trait IntoKeydbValue {
    /// Convert a value into `keydb::Value`.
    fn into_keydb_value(self) -> Value;
}

macro_rules! into_keydb_value_impl_int {
    ($t:ty) => {
        impl IntoKeydbValue for $t {
            fn into_keydb_value(self) -> Value {
                Value::Int(self as i64)
            }
        }
    };
}

into_keydb_value_impl_int!(i8);
into_keydb_value_impl_int!(i16);
into_keydb_value_impl_int!(i32);
into_keydb_value_impl_int!(i64);
into_keydb_value_impl_int!(u8);
into_keydb_value_impl_int!(u16);
into_keydb_value_impl_int!(u32);

macro_rules! into_keydb_value_impl_float {
    ($t:ty) => {
        impl IntoKeydbValue for $t {
            fn into_keydb_value(self) -> Value {
                Value::Double(self as f64)
            }
        }
    };
}

into_keydb_value_impl_float!(f32);
into_keydb_value_impl_float!(f64);

impl IntoKeydbValue for String {
    fn into_keydb_value(self) -> Value {
        Value::BulkString(self.into_bytes())
    }
}

impl IntoKeydbValue for &str {
    fn into_keydb_value(self) -> Value {
        Value::BulkString(self.as_bytes().to_vec())
    }
}

impl IntoKeydbValue for bool {
    fn into_keydb_value(self) -> Value {
        Value::Boolean(self)
    }
}

impl IntoKeydbValue for Vec<u8> {
    fn into_keydb_value(self) -> Value {
        Value::BulkString(self)
    }
}

impl IntoKeydbValue for Vec<Value> {
    fn into_keydb_value(self) -> Value {
        Value::Array(self)
    }
}

impl IntoKeydbValue for Vec<(Value, Value)> {
    fn into_keydb_value(self) -> Value {
        Value::Map(self)
    }
}

impl IntoKeydbValue for Value {
    fn into_keydb_value(self) -> Value {
        self
    }
}

impl IntoKeydbValue for ServerError {
    fn into_keydb_value(self) -> Value {
        Value::ServerError(self)
    }
}

/// Helper trait for converting `keydb::Cmd` and `keydb::Pipeline`
/// instances into encoded byte vectors.
pub trait IntoKeydbCmdBytes {
    /// Convert a command into an encoded byte vector.
    fn into_keydb_cmd_bytes(self) -> Vec<u8>;
}

impl IntoKeydbCmdBytes for Cmd {
    fn into_keydb_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_command()
    }
}

impl IntoKeydbCmdBytes for &Cmd {
    fn into_keydb_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_command()
    }
}

impl IntoKeydbCmdBytes for &mut Cmd {
    fn into_keydb_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_command()
    }
}

impl IntoKeydbCmdBytes for Pipeline {
    fn into_keydb_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_pipeline()
    }
}

impl IntoKeydbCmdBytes for &Pipeline {
    fn into_keydb_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_pipeline()
    }
}

impl IntoKeydbCmdBytes for &mut Pipeline {
    fn into_keydb_cmd_bytes(self) -> Vec<u8> {
        self.get_packed_pipeline()
    }
}

/// Represents a command to be executed against a `MockKeydbConnection`.
pub struct MockCmd {
    cmd_bytes: Vec<u8>,
    responses: Result<Vec<Value>, KeydbError>,
}

impl MockCmd {
    /// Create a new `MockCmd` given a command and either a value
    /// convertible to a `keydb::Value` or a `KeydbError`.
    pub fn new<C, V>(cmd: C, response: Result<V, KeydbError>) -> Self
    where
        C: IntoKeydbCmdBytes,
        V: IntoKeydbValue,
    {
        MockCmd {
            cmd_bytes: cmd.into_keydb_cmd_bytes(),
            responses: response.map(|r| vec![r.into_keydb_value()]),
        }
    }

    /// Create a new `MockCmd` given a command or pipeline and a vector of
    /// values convertible to a `keydb::Value`, or a `KeydbError`.
    pub fn with_values<C, V>(cmd: C, responses: Result<Vec<V>, KeydbError>) -> Self
    where
        C: IntoKeydbCmdBytes,
        V: IntoKeydbValue,
    {
        MockCmd {
            cmd_bytes: cmd.into_keydb_cmd_bytes(),
            responses: responses.map(|xs| xs.into_iter().map(|x| x.into_keydb_value()).collect()),
        }
    }
}

/// A mock connection for testing without a server. `MockKeydbConnection`
/// checks whether the client submits a specific sequence of commands and
/// generates an error if it does not.
#[derive(Clone)]
pub struct MockKeydbConnection {
    commands: Arc<Mutex<VecDeque<MockCmd>>>,
}

impl MockKeydbConnection {
    /// Construct a new from the given sequence of commands.
    pub fn new<I>(commands: I) -> Self
    where
        I: IntoIterator<Item = MockCmd>,
    {
        MockKeydbConnection {
            commands: Arc::new(Mutex::new(VecDeque::from_iter(commands))),
        }
    }

    /// Returns true if every expected command has been consumed.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().unwrap().is_empty()
    }
}

fn pop_and_check(
    commands: &mut VecDeque<MockCmd>,
    cmd: &[u8],
) -> KeydbResult<Result<Vec<Value>, KeydbError>> {
    let next_cmd = commands.pop_front().ok_or_else(|| {
        KeydbError::from((ErrorKind::ClientError, "TEST", "unexpected command".to_owned()))
    })?;

    if cmd != next_cmd.cmd_bytes {
        return Err(KeydbError::from((
            ErrorKind::ClientError,
            "TEST",
            format!(
                "unexpected command: expected={}, actual={}",
                String::from_utf8(next_cmd.cmd_bytes).unwrap_or_else(|_| "decode error".to_owned()),
                String::from_utf8(Vec::from(cmd)).unwrap_or_else(|_| "decode error".to_owned()),
            ),
        )));
    }

    Ok(next_cmd.responses)
}

impl ConnectionLike for MockKeydbConnection {
    fn req_packed_command(&mut self, cmd: &[u8]) -> KeydbResult<Value> {
        let mut commands = self.commands.lock().unwrap();
        pop_and_check(&mut commands, cmd)?.and_then(|values| match values.as_slice() {
            [value] => Ok(value.clone()),
            [] => Err(KeydbError::from((
                ErrorKind::ClientError,
                "no value configured as response",
            ))),
            _ => Err(KeydbError::from((
                ErrorKind::ClientError,
                "multiple values configured as response for command expecting a single value",
            ))),
        })
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        _offset: usize,
        _count: usize,
    ) -> KeydbResult<Vec<Value>> {
        let mut commands = self.commands.lock().unwrap();
        pop_and_check(&mut commands, cmd)?
    }

    fn get_db(&self) -> i64 {
        0
    }

    fn check_connection(&mut self) -> bool {
        true
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{IntoKeydbValue, MockCmd, MockKeydbConnection};
    use keydb::{cmd, pipe, ErrorKind, Value};

    #[test]
    fn into_keydb_value_int() {
        assert_eq!(42_i32.into_keydb_value(), Value::Int(42));
        assert_eq!(42_u8.into_keydb_value(), Value::Int(42));
    }

    #[test]
    fn into_keydb_value_string() {
        assert_eq!(
            "foo".into_keydb_value(),
            Value::BulkString(b"foo".to_vec())
        );
        assert_eq!(
            "foo".to_string().into_keydb_value(),
            Value::BulkString(b"foo".to_vec())
        );
    }

    #[test]
    fn into_keydb_value_bool() {
        assert_eq!(true.into_keydb_value(), Value::Boolean(true));
        assert_eq!(false.into_keydb_value(), Value::Boolean(false));
    }

    #[test]
    fn sync_basic_test() {
        let mut conn = MockKeydbConnection::new(vec![
            MockCmd::new(cmd("SET").arg("foo").arg(42), Ok("")),
            MockCmd::new(cmd("GET").arg("foo"), Ok(42)),
            MockCmd::new(cmd("SET").arg("bar").arg("foo"), Ok("")),
            MockCmd::new(cmd("GET").arg("bar"), Ok("foo")),
        ]);

        cmd("SET").arg("foo").arg(42).exec(&mut conn).unwrap();
        assert_eq!(cmd("GET").arg("foo").query(&mut conn), Ok(42));

        cmd("SET").arg("bar").arg("foo").exec(&mut conn).unwrap();
        assert_eq!(
            cmd("GET").arg("bar").query(&mut conn),
            Ok(Value::BulkString(b"foo".as_ref().into()))
        );
        assert!(conn.is_empty());
    }

    #[test]
    fn errors_for_unexpected_commands() {
        let mut conn = MockKeydbConnection::new(vec![
            MockCmd::new(cmd("SET").arg("foo").arg(42), Ok("")),
            MockCmd::new(cmd("GET").arg("foo"), Ok(42)),
        ]);

        cmd("SET").arg("foo").arg(42).exec(&mut conn).unwrap();
        assert_eq!(cmd("GET").arg("foo").query(&mut conn), Ok(42));

        let err = cmd("SET")
            .arg("bar")
            .arg("foo")
            .exec(&mut conn)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(err.detail(), Some("unexpected command"));
    }

    #[test]
    fn errors_for_mismatched_commands() {
        let mut conn = MockKeydbConnection::new(vec![
            MockCmd::new(cmd("SET").arg("foo").arg(42), Ok("")),
            MockCmd::new(cmd("GET").arg("foo"), Ok(42)),
            MockCmd::new(cmd("SET").arg("bar").arg("foo"), Ok("")),
        ]);

        cmd("SET").arg("foo").arg(42).exec(&mut conn).unwrap();
        let err = cmd("SET")
            .arg("bar")
            .arg("foo")
            .exec(&mut conn)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert!(err.detail().unwrap().contains("unexpected command"));
    }

    #[test]
    fn pipeline_basic_test() {
        let mut conn = MockKeydbConnection::new(vec![MockCmd::with_values(
            pipe().cmd("GET").arg("foo").cmd("GET").arg("bar"),
            Ok(vec!["hello", "world"]),
        )]);

        let results: Vec<String> = pipe()
            .cmd("GET")
            .arg("foo")
            .cmd("GET")
            .arg("bar")
            .query(&mut conn)
            .expect("success");
        assert_eq!(results, vec!["hello", "world"]);
    }

    #[test]
    fn pipeline_atomic_test() {
        // an atomic pipeline reads back the MULTI ack, one QUEUED ack per
        // command and the EXEC array
        let mut responses: Vec<Value> = vec![
            Value::Okay,
            Value::SimpleString("QUEUED".to_string()),
            Value::SimpleString("QUEUED".to_string()),
        ];
        responses.push(Value::Array(
            vec!["hello", "world"]
                .into_iter()
                .map(|x| Value::BulkString(x.as_bytes().into()))
                .collect(),
        ));
        let mut conn = MockKeydbConnection::new(vec![MockCmd::with_values(
            pipe().atomic().cmd("GET").arg("foo").cmd("GET").arg("bar"),
            Ok(responses),
        )]);

        let results: Vec<String> = pipe()
            .atomic()
            .cmd("GET")
            .arg("foo")
            .cmd("GET")
            .arg("bar")
            .query(&mut conn)
            .expect("success");
        assert_eq!(results, vec!["hello", "world"]);
    }
}

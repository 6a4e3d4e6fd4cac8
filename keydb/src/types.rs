use std::collections::HashMap;
use std::error;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::io;
use std::str::{from_utf8, Utf8Error};
use std::string::FromUtf8Error;

macro_rules! invalid_type_error {
    ($v:expr, $det:expr) => {{
        fail!(invalid_type_error_inner!($v, $det))
    }};
}

macro_rules! invalid_type_error_inner {
    ($v:expr, $det:expr) => {
        KeydbError::from((
            ErrorKind::TypeError,
            "Response was of incompatible type",
            format!("{:?} (response was {:?})", $det, $v),
        ))
    };
}

/// An enum of all error kinds.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The server generated an invalid response.
    ResponseError,
    /// A transaction was aborted server-side before it could run.
    ExecAbortError,
    /// The server cannot respond because it's loading a dump.
    BusyLoadingError,
    /// A script that was requested does not actually exist.
    NoScriptError,
    /// Attempt to write to a read-only server.
    ReadOnly,
    /// Attempted to kill a script while it wasn't executing.
    NotBusy,
    /// The authentication with the server failed.
    AuthenticationFailed,
    /// Operation failed because of a type mismatch.
    TypeError,
    /// A command argument could not be serialized onto the wire.
    EncodingError,
    /// The parser failed to parse the server response.
    ParseError,
    /// A connect, read or acquire deadline was exceeded.
    Timeout,
    /// No pooled connection became available within the acquire timeout.
    PoolExhausted,
    /// An atomic pipeline was rejected by the server; the queued replies
    /// are available through [`KeydbError::aborted_replies`].
    TransactionAborted,
    /// An error that was caused because the parameter to the
    /// client were wrong.
    InvalidClientConfig,
    /// This kind is returned if the error is one that is
    /// not native to the system.  This is usually the case if
    /// the cause is another error.
    IoError,
    /// An error raised that was identified on the client before execution.
    ClientError,
    /// An extension error.  This is an error created by the server
    /// that is not directly understood by the library.
    ExtensionError,
}

/// The known `-ERR`-style error codes sent by the server.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ServerErrorKind {
    /// Generic response error (`ERR`).
    ResponseError,
    /// The transaction was discarded because of earlier errors (`EXECABORT`).
    ExecAbortError,
    /// The server is loading a dump (`LOADING`).
    BusyLoadingError,
    /// The requested script does not exist (`NOSCRIPT`).
    NoScriptError,
    /// The server is read-only (`READONLY`).
    ReadOnly,
    /// No script was executing (`NOTBUSY`).
    NotBusy,
}

impl ServerErrorKind {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            ServerErrorKind::ResponseError => "ERR",
            ServerErrorKind::ExecAbortError => "EXECABORT",
            ServerErrorKind::BusyLoadingError => "LOADING",
            ServerErrorKind::NoScriptError => "NOSCRIPT",
            ServerErrorKind::ReadOnly => "READONLY",
            ServerErrorKind::NotBusy => "NOTBUSY",
        }
    }
}

/// An error reply sent by the server.
///
/// Error replies are kept as regular [`Value`]s while a batch of replies is
/// demultiplexed, so that a failing command inside a pipeline does not mask
/// the replies of its neighbors.  They are converted into [`KeydbError`]s by
/// [`Value::extract_error`] or by the typed conversions in
/// [`FromKeydbValue`].
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum ServerError {
    /// An error code this library does not know about.
    ExtensionError {
        /// The error code sent by the server.
        code: String,
        /// The detail text, if any.
        detail: Option<String>,
    },
    /// A recognized error code.
    KnownError {
        /// The kind of error.
        kind: ServerErrorKind,
        /// The detail text, if any.
        detail: Option<String>,
    },
}

impl ServerError {
    /// Returns the kind of the error, if it is a known one.
    pub fn kind(&self) -> Option<ServerErrorKind> {
        match self {
            ServerError::ExtensionError { .. } => None,
            ServerError::KnownError { kind, .. } => Some(*kind),
        }
    }

    /// Returns the error code as sent by the server.
    pub fn code(&self) -> &str {
        match self {
            ServerError::ExtensionError { code, .. } => code,
            ServerError::KnownError { kind, .. } => kind.code(),
        }
    }

    /// Returns the detail text of the error, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            ServerError::ExtensionError { detail, .. } => detail.as_deref(),
            ServerError::KnownError { detail, .. } => detail.as_deref(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.details() {
            Some(detail) => write!(f, "{}: {detail}", self.code()),
            None => write!(f, "{}", self.code()),
        }
    }
}

impl error::Error for ServerError {}

impl From<ServerError> for KeydbError {
    fn from(value: ServerError) -> Self {
        match value {
            ServerError::ExtensionError { code, detail } => make_extension_error(code, detail),
            ServerError::KnownError { kind, detail } => {
                let desc = "An error was signalled by the server";
                let kind = match kind {
                    ServerErrorKind::ResponseError => ErrorKind::ResponseError,
                    ServerErrorKind::ExecAbortError => ErrorKind::ExecAbortError,
                    ServerErrorKind::BusyLoadingError => ErrorKind::BusyLoadingError,
                    ServerErrorKind::NoScriptError => ErrorKind::NoScriptError,
                    ServerErrorKind::ReadOnly => ErrorKind::ReadOnly,
                    ServerErrorKind::NotBusy => ErrorKind::NotBusy,
                };
                match detail {
                    Some(detail) => KeydbError::from((kind, desc, detail)),
                    None => KeydbError::from((kind, desc)),
                }
            }
        }
    }
}

/// Low-level reply value.
///
/// Covers the RESP2 and RESP3 reply kinds this library decodes.  A negative
/// length bulk string or array decodes to [`Value::Nil`].
#[derive(PartialEq, Clone)]
pub enum Value {
    /// A nil response from the server.
    Nil,
    /// An integer response.  Note that there are a few situations
    /// in which the server actually returns a string for an integer which
    /// is why this library generally treats integers and strings
    /// the same for all numeric responses.
    Int(i64),
    /// An arbitrary binary data, usually represents a binary-safe string.
    BulkString(Vec<u8>),
    /// A response containing an array with more data.  This is generally
    /// used by the server to express nested structures.
    Array(Vec<Value>),
    /// A simple string response, without line breaks and not binary safe.
    SimpleString(String),
    /// A status response which represents the string "OK".
    Okay,
    /// Unordered key,value list from the server.  Use `as_map_iter` function.
    Map(Vec<(Value, Value)>),
    /// A set of values.
    Set(Vec<Value>),
    /// A floating number response from the server.
    Double(f64),
    /// A boolean response from the server.
    Boolean(bool),
    /// An error reply.  Error replies never coerce to success values; typed
    /// conversions turn them into a `KeydbError`.
    ServerError(ServerError),
}

/// An iterator over the key value pairs of a map-shaped reply.
///
/// Both RESP3 map replies and RESP2 flat key/value arrays iterate the same
/// way through this type.
pub struct MapIter<'a>(MapIterRepr<'a>);

enum MapIterRepr<'a> {
    Flat(std::slice::Iter<'a, Value>),
    Pairs(std::slice::Iter<'a, (Value, Value)>),
}

impl<'a> Iterator for MapIter<'a> {
    type Item = (&'a Value, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            MapIterRepr::Flat(it) => Some((it.next()?, it.next()?)),
            MapIterRepr::Pairs(it) => it.next().map(|(k, v)| (k, v)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.0 {
            MapIterRepr::Flat(it) => {
                let (low, high) = it.size_hint();
                (low / 2, high.map(|h| h / 2))
            }
            MapIterRepr::Pairs(it) => it.size_hint(),
        }
    }
}

/// The owned counterpart of [`MapIter`].
pub struct OwnedMapIter(std::vec::IntoIter<Value>);

impl Iterator for OwnedMapIter {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.0.next()?, self.0.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (low, high) = self.0.size_hint();
        (low / 2, high.map(|h| h / 2))
    }
}

/// Values are generally not used directly unless you are using the
/// more low level functionality in the library.  For the most part
/// this is hidden with the help of the `FromKeydbValue` trait.
impl Value {
    /// Returns an `&[Value]` if `self` is compatible with a sequence type.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(&items[..]),
            Value::Set(items) => Some(&items[..]),
            Value::Nil => Some(&[]),
            _ => None,
        }
    }

    /// Returns a `Vec<Value>` if `self` is compatible with a sequence type,
    /// otherwise returns `Err(self)`.
    pub fn into_sequence(self) -> Result<Vec<Value>, Value> {
        match self {
            Value::Array(items) => Ok(items),
            Value::Set(items) => Ok(items),
            Value::Nil => Ok(vec![]),
            _ => Err(self),
        }
    }

    /// Returns an iterator of `(&Value, &Value)` if `self` is compatible with a map type.
    pub fn as_map_iter(&self) -> Option<MapIter<'_>> {
        match self {
            Value::Array(items) => {
                if items.len() % 2 == 0 {
                    Some(MapIter(MapIterRepr::Flat(items.iter())))
                } else {
                    None
                }
            }
            Value::Map(items) => Some(MapIter(MapIterRepr::Pairs(items.iter()))),
            _ => None,
        }
    }

    /// Returns an iterator of `(Value, Value)` if `self` is compatible with a map type.
    /// If not, returns `Err(self)`.
    pub fn into_map_iter(self) -> Result<OwnedMapIter, Value> {
        match self {
            Value::Array(items) => {
                if items.len() % 2 == 0 {
                    Ok(OwnedMapIter(items.into_iter()))
                } else {
                    Err(Value::Array(items))
                }
            }
            Value::Map(items) => {
                let mut flat = Vec::with_capacity(items.len() * 2);
                for (key, value) in items {
                    flat.push(key);
                    flat.push(value);
                }
                Ok(OwnedMapIter(flat.into_iter()))
            }
            _ => Err(self),
        }
    }

    /// If `self` is an error reply, or contains one in a nested aggregate,
    /// converts the first such reply into a `KeydbError`.  Otherwise the
    /// value is passed through unchanged.
    pub fn extract_error(self) -> KeydbResult<Value> {
        match self {
            Value::Array(val) => Ok(Value::Array(Value::extract_error_vec(val)?)),
            Value::Set(val) => Ok(Value::Set(Value::extract_error_vec(val)?)),
            Value::Map(map) => {
                let mut vec = Vec::with_capacity(map.len());
                for (key, value) in map {
                    vec.push((key.extract_error()?, value.extract_error()?));
                }
                Ok(Value::Map(vec))
            }
            Value::ServerError(err) => Err(err.into()),
            _ => Ok(self),
        }
    }

    fn extract_error_vec(vec: Vec<Self>) -> KeydbResult<Vec<Value>> {
        vec.into_iter()
            .map(Self::extract_error)
            .collect::<KeydbResult<Vec<Value>>>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(fmt, "nil"),
            Value::Int(val) => write!(fmt, "int({val:?})"),
            Value::BulkString(val) => match from_utf8(val) {
                Ok(x) => write!(fmt, "bulk-string('{x:?}')"),
                Err(_) => write!(fmt, "binary-data({val:?})"),
            },
            Value::Array(values) => write!(fmt, "array({values:?})"),
            Value::SimpleString(s) => write!(fmt, "simple-string({s:?})"),
            Value::Okay => write!(fmt, "ok"),
            Value::Map(values) => write!(fmt, "map({values:?})"),
            Value::Set(values) => write!(fmt, "set({values:?})"),
            Value::Double(val) => write!(fmt, "double({val:?})"),
            Value::Boolean(val) => write!(fmt, "boolean({val:?})"),
            Value::ServerError(err) => write!(fmt, "server-error({err})"),
        }
    }
}

/// Represents a client error.  For the most part you should be using
/// the Error trait to interact with this rather than the actual
/// struct.
pub struct KeydbError {
    repr: ErrorRepr,
}

#[derive(Debug)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    ExtensionError(String, String),
    IoError(io::Error),
    TransactionAborted(Vec<Value>),
}

impl PartialEq for KeydbError {
    fn eq(&self, other: &KeydbError) -> bool {
        match (&self.repr, &other.repr) {
            (&ErrorRepr::WithDescription(kind_a, _), &ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                &ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                &ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::ExtensionError(a, _), ErrorRepr::ExtensionError(b, _)) => *a == *b,
            (ErrorRepr::TransactionAborted(a), ErrorRepr::TransactionAborted(b)) => *a == *b,
            _ => false,
        }
    }
}

impl From<io::Error> for KeydbError {
    fn from(err: io::Error) -> KeydbError {
        KeydbError {
            repr: ErrorRepr::IoError(err),
        }
    }
}

impl From<Utf8Error> for KeydbError {
    fn from(_: Utf8Error) -> KeydbError {
        KeydbError {
            repr: ErrorRepr::WithDescription(ErrorKind::TypeError, "Invalid UTF-8"),
        }
    }
}

impl From<FromUtf8Error> for KeydbError {
    fn from(_: FromUtf8Error) -> KeydbError {
        KeydbError {
            repr: ErrorRepr::WithDescription(ErrorKind::TypeError, "Cannot convert from UTF-8"),
        }
    }
}

impl From<(ErrorKind, &'static str)> for KeydbError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> KeydbError {
        KeydbError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for KeydbError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> KeydbError {
        KeydbError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl error::Error for KeydbError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::IoError(ref err) => Some(err as &dyn error::Error),
            _ => None,
        }
    }
}

impl fmt::Display for KeydbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                desc.fmt(f)?;
                f.write_str(" - ")?;
                fmt::Debug::fmt(&kind, f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                desc.fmt(f)?;
                f.write_str(" - ")?;
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                detail.fmt(f)
            }
            ErrorRepr::ExtensionError(ref code, ref detail) => {
                code.fmt(f)?;
                f.write_str(": ")?;
                detail.fmt(f)
            }
            ErrorRepr::IoError(ref err) => err.fmt(f),
            ErrorRepr::TransactionAborted(ref replies) => {
                write!(f, "Transaction aborted by the server ({} queued)", replies.len())
            }
        }
    }
}

impl fmt::Debug for KeydbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        fmt::Display::fmt(self, f)
    }
}

/// Indicates a general failure in the library.
impl KeydbError {
    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::ExtensionError(_, _) => ErrorKind::ExtensionError,
            ErrorRepr::IoError(_) => ErrorKind::IoError,
            ErrorRepr::TransactionAborted(_) => ErrorKind::TransactionAborted,
        }
    }

    /// Returns the error detail.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail)
            | ErrorRepr::ExtensionError(_, ref detail) => Some(detail.as_str()),
            _ => None,
        }
    }

    /// Returns the raw error code if available.
    pub fn code(&self) -> Option<&str> {
        match self.kind() {
            ErrorKind::ResponseError => Some("ERR"),
            ErrorKind::ExecAbortError => Some("EXECABORT"),
            ErrorKind::BusyLoadingError => Some("LOADING"),
            ErrorKind::NoScriptError => Some("NOSCRIPT"),
            ErrorKind::ReadOnly => Some("READONLY"),
            ErrorKind::NotBusy => Some("NOTBUSY"),
            _ => match self.repr {
                ErrorRepr::ExtensionError(ref code, _) => Some(code),
                _ => None,
            },
        }
    }

    /// Returns the name of the error category for display purposes.
    pub fn category(&self) -> &str {
        match self.kind() {
            ErrorKind::ResponseError => "response error",
            ErrorKind::ExecAbortError => "transaction aborted by earlier error",
            ErrorKind::BusyLoadingError => "busy loading",
            ErrorKind::NoScriptError => "no script",
            ErrorKind::ReadOnly => "read-only",
            ErrorKind::NotBusy => "not busy",
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::TypeError => "type error",
            ErrorKind::EncodingError => "encoding error",
            ErrorKind::ParseError => "parse error",
            ErrorKind::Timeout => "timed out",
            ErrorKind::PoolExhausted => "connection pool exhausted",
            ErrorKind::TransactionAborted => "transaction aborted",
            ErrorKind::InvalidClientConfig => "invalid client config",
            ErrorKind::IoError => "I/O error",
            ErrorKind::ClientError => "client error",
            ErrorKind::ExtensionError => "extension error",
        }
    }

    /// Indicates that this failure is an IO failure.
    pub fn is_io_error(&self) -> bool {
        self.kind() == ErrorKind::IoError
    }

    pub(crate) fn as_io_error(&self) -> Option<&io::Error> {
        match &self.repr {
            ErrorRepr::IoError(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if this error indicates that the connection was
    /// refused.  You should generally not rely much on this function
    /// unless you are writing unit tests that want to detect if a
    /// local server is available.
    pub fn is_connection_refusal(&self) -> bool {
        match self.repr {
            ErrorRepr::IoError(ref err) => {
                #[allow(clippy::match_like_matches_macro)]
                match err.kind() {
                    io::ErrorKind::ConnectionRefused => true,
                    // if we connect to a unix socket and the file does not
                    // exist yet, then we want to treat this as if it was a
                    // connection refusal.
                    io::ErrorKind::NotFound => cfg!(unix),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Returns true if error was caused by I/O time out.
    /// Note that this may not be accurate depending on platform.
    pub fn is_timeout(&self) -> bool {
        match self.repr {
            ErrorRepr::IoError(ref err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => self.kind() == ErrorKind::Timeout,
        }
    }

    /// Returns true if error was caused by a dropped connection.
    pub fn is_connection_dropped(&self) -> bool {
        match self.repr {
            ErrorRepr::IoError(ref err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// The per-command replies the server acknowledged before it aborted an
    /// atomic pipeline.  Only present on `TransactionAborted` errors.
    pub fn aborted_replies(&self) -> Option<&[Value]> {
        match self.repr {
            ErrorRepr::TransactionAborted(ref replies) => Some(replies),
            _ => None,
        }
    }

    pub(crate) fn transaction_aborted(replies: Vec<Value>) -> KeydbError {
        KeydbError {
            repr: ErrorRepr::TransactionAborted(replies),
        }
    }
}

/// Creates an error for an extension error code that is not directly
/// understood by the library.
pub fn make_extension_error(code: String, detail: Option<String>) -> KeydbError {
    KeydbError {
        repr: ErrorRepr::ExtensionError(
            code,
            match detail {
                Some(x) => x,
                None => "Unknown extension error encountered".to_string(),
            },
        ),
    }
}

/// Library generic result type.
pub type KeydbResult<T> = Result<T, KeydbError>;

/// Abstraction trait for command argument sinks.
pub trait KeydbWrite {
    /// Accepts a serialized command argument.
    fn write_arg(&mut self, arg: &[u8]);

    /// Accepts a displayable command argument.
    fn write_arg_fmt(&mut self, arg: impl fmt::Display) {
        self.write_arg(arg.to_string().as_bytes())
    }
}

impl KeydbWrite for Vec<Vec<u8>> {
    fn write_arg(&mut self, arg: &[u8]) {
        self.push(arg.to_owned());
    }

    fn write_arg_fmt(&mut self, arg: impl fmt::Display) {
        self.push(arg.to_string().into_bytes())
    }
}

/// Used to convert a value into one or multiple command argument
/// strings.  Most values will produce exactly one item but in
/// some cases it might make sense to produce more than one.
pub trait ToKeydbArgs: Sized {
    /// This converts the value into a vector of bytes.  Each item
    /// is a single argument.  Most items generate a vector of a
    /// single item.
    ///
    /// The exception to this rule currently are vectors of items.
    fn to_keydb_args(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        self.write_keydb_args(&mut out);
        out
    }

    /// This writes the value into a vector of bytes.  Each item
    /// is a single argument.  Most items generate a single item.
    ///
    /// The exception to this rule currently are vectors of items.
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite;

    /// This only exists internally as a workaround for the lack of
    /// specialization.
    #[doc(hidden)]
    fn write_args_from_slice<W>(items: &[Self], out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        for item in items {
            item.write_keydb_args(out);
        }
    }
}

macro_rules! itoa_based_to_keydb_impl {
    ($t:ty) => {
        impl ToKeydbArgs for $t {
            fn write_keydb_args<W>(&self, out: &mut W)
            where
                W: ?Sized + KeydbWrite,
            {
                let mut buf = ::itoa::Buffer::new();
                let s = buf.format(*self);
                out.write_arg(s.as_bytes())
            }
        }
    };
}

macro_rules! ryu_based_to_keydb_impl {
    ($t:ty) => {
        impl ToKeydbArgs for $t {
            fn write_keydb_args<W>(&self, out: &mut W)
            where
                W: ?Sized + KeydbWrite,
            {
                let mut buf = ::ryu::Buffer::new();
                let s = buf.format(*self);
                out.write_arg(s.as_bytes())
            }
        }
    };
}

impl ToKeydbArgs for u8 {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        let mut buf = ::itoa::Buffer::new();
        let s = buf.format(*self);
        out.write_arg(s.as_bytes())
    }

    // this hack allows us to special-case Vec<u8> and &[u8] to work
    // with binary data.
    fn write_args_from_slice<W>(items: &[u8], out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        out.write_arg(items);
    }
}

itoa_based_to_keydb_impl!(i8);
itoa_based_to_keydb_impl!(i16);
itoa_based_to_keydb_impl!(u16);
itoa_based_to_keydb_impl!(i32);
itoa_based_to_keydb_impl!(u32);
itoa_based_to_keydb_impl!(i64);
itoa_based_to_keydb_impl!(u64);
itoa_based_to_keydb_impl!(isize);
itoa_based_to_keydb_impl!(usize);

ryu_based_to_keydb_impl!(f32);
ryu_based_to_keydb_impl!(f64);

impl ToKeydbArgs for bool {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        out.write_arg(if *self { b"1" } else { b"0" })
    }
}

impl ToKeydbArgs for String {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        out.write_arg(self.as_bytes())
    }
}

impl<'a> ToKeydbArgs for &'a str {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        out.write_arg(self.as_bytes())
    }
}

impl<T: ToKeydbArgs> ToKeydbArgs for Vec<T> {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        ToKeydbArgs::write_args_from_slice(self, out)
    }
}

impl<'a, T: ToKeydbArgs> ToKeydbArgs for &'a [T] {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        ToKeydbArgs::write_args_from_slice(self, out)
    }
}

impl<T: ToKeydbArgs> ToKeydbArgs for Option<T> {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        if let Some(ref x) = *self {
            x.write_keydb_args(out);
        }
    }
}

impl<T: ToKeydbArgs> ToKeydbArgs for &T {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        (*self).write_keydb_args(out)
    }
}

impl<T: ToKeydbArgs, const N: usize> ToKeydbArgs for &[T; N] {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        ToKeydbArgs::write_args_from_slice(self.as_slice(), out)
    }
}

/// This trait is used to convert a reply value into a more appropriate
/// type.  While a `Value` can represent any response that comes
/// back from the server, usually you want to map this into something
/// that works better in rust.  For instance you might want to convert the
/// return value into a `String` or an integer.
///
/// This trait is well supported throughout the library and you can
/// implement it for your own types if you want.
pub trait FromKeydbValue: Sized {
    /// Given a `Value` this attempts to convert it into the given
    /// destination type.  If that fails because it's not compatible an
    /// appropriate error is generated.
    fn from_keydb_value(v: &Value) -> KeydbResult<Self>;

    /// Given a `Value` this attempts to convert it into the given
    /// destination type.  If that fails because it's not compatible an
    /// appropriate error is generated.
    fn from_owned_keydb_value(v: Value) -> KeydbResult<Self> {
        // By default, fall back to `from_keydb_value`.
        // This function only needs to be implemented if it can benefit
        // from taking `v` by value.
        Self::from_keydb_value(&v)
    }

    /// Similar to `from_keydb_value` but constructs a vector of objects
    /// from another vector of values.  This primarily exists internally
    /// to customize the behavior for vectors of items.
    fn from_keydb_values(items: &[Value]) -> KeydbResult<Vec<Self>> {
        items.iter().map(FromKeydbValue::from_keydb_value).collect()
    }

    /// The same as `from_keydb_values`, but takes a `Vec<Value>` instead
    /// of a `&[Value]`.
    fn from_owned_keydb_values(items: Vec<Value>) -> KeydbResult<Vec<Self>> {
        items
            .into_iter()
            .map(FromKeydbValue::from_owned_keydb_value)
            .collect()
    }

    /// Convert bytes to a single element vector.
    fn from_byte_vec(_vec: &[u8]) -> Option<Vec<Self>> {
        Self::from_owned_keydb_value(Value::BulkString(_vec.into()))
            .map(|rv| vec![rv])
            .ok()
    }

    /// Convert bytes to a single element vector.
    fn from_owned_byte_vec(_vec: Vec<u8>) -> KeydbResult<Vec<Self>> {
        Self::from_owned_keydb_value(Value::BulkString(_vec)).map(|rv| vec![rv])
    }
}

macro_rules! from_keydb_value_for_num_internal {
    ($t:ty, $v:expr) => {{
        let v = $v;
        match *v {
            Value::Int(val) => Ok(val as $t),
            Value::Double(val) => Ok(val as $t),
            Value::SimpleString(ref s) => match s.parse::<$t>() {
                Ok(rv) => Ok(rv),
                Err(_) => invalid_type_error!(v, "Could not convert from string."),
            },
            Value::BulkString(ref bytes) => match from_utf8(bytes)?.parse::<$t>() {
                Ok(rv) => Ok(rv),
                Err(_) => invalid_type_error!(v, "Could not convert from string."),
            },
            Value::ServerError(ref err) => Err(err.clone().into()),
            _ => invalid_type_error!(v, "Response type not convertible to numeric."),
        }
    }};
}

macro_rules! from_keydb_value_for_num {
    ($t:ty) => {
        impl FromKeydbValue for $t {
            fn from_keydb_value(v: &Value) -> KeydbResult<$t> {
                from_keydb_value_for_num_internal!($t, v)
            }
        }
    };
}

impl FromKeydbValue for u8 {
    fn from_keydb_value(v: &Value) -> KeydbResult<u8> {
        from_keydb_value_for_num_internal!(u8, v)
    }

    // this hack allows us to specialize Vec<u8> to work with binary data.
    fn from_byte_vec(vec: &[u8]) -> Option<Vec<u8>> {
        Some(vec.to_vec())
    }
    fn from_owned_byte_vec(vec: Vec<u8>) -> KeydbResult<Vec<u8>> {
        Ok(vec)
    }
}

from_keydb_value_for_num!(i8);
from_keydb_value_for_num!(i16);
from_keydb_value_for_num!(u16);
from_keydb_value_for_num!(i32);
from_keydb_value_for_num!(u32);
from_keydb_value_for_num!(i64);
from_keydb_value_for_num!(u64);
from_keydb_value_for_num!(i128);
from_keydb_value_for_num!(u128);
from_keydb_value_for_num!(f32);
from_keydb_value_for_num!(f64);
from_keydb_value_for_num!(isize);
from_keydb_value_for_num!(usize);

impl FromKeydbValue for bool {
    fn from_keydb_value(v: &Value) -> KeydbResult<bool> {
        match *v {
            Value::Nil => Ok(false),
            Value::Int(val) => Ok(val != 0),
            Value::Boolean(b) => Ok(b),
            Value::SimpleString(ref s) => {
                if &s[..] == "1" {
                    Ok(true)
                } else if &s[..] == "0" {
                    Ok(false)
                } else {
                    invalid_type_error!(v, "Response status not valid boolean");
                }
            }
            Value::BulkString(ref bytes) => {
                if bytes == b"1" {
                    Ok(true)
                } else if bytes == b"0" {
                    Ok(false)
                } else {
                    invalid_type_error!(v, "Response type not bool compatible.");
                }
            }
            Value::Okay => Ok(true),
            Value::ServerError(ref err) => Err(err.clone().into()),
            _ => invalid_type_error!(v, "Response type not bool compatible."),
        }
    }
}

impl FromKeydbValue for String {
    fn from_keydb_value(v: &Value) -> KeydbResult<String> {
        match *v {
            Value::BulkString(ref bytes) => Ok(from_utf8(bytes)?.to_string()),
            Value::Okay => Ok("OK".to_string()),
            Value::SimpleString(ref val) => Ok(val.to_string()),
            Value::ServerError(ref err) => Err(err.clone().into()),
            _ => invalid_type_error!(v, "Response type not string compatible."),
        }
    }
    fn from_owned_keydb_value(v: Value) -> KeydbResult<String> {
        match v {
            Value::BulkString(bytes) => Ok(String::from_utf8(bytes)?),
            Value::Okay => Ok("OK".to_string()),
            Value::SimpleString(val) => Ok(val),
            Value::ServerError(err) => Err(err.into()),
            _ => invalid_type_error!(v, "Response type not string compatible."),
        }
    }
}

impl<T: FromKeydbValue> FromKeydbValue for Vec<T> {
    fn from_keydb_value(v: &Value) -> KeydbResult<Vec<T>> {
        match v {
            // All binary data except u8 will try to parse into a single element vector.
            // u8 has its own implementation of from_byte_vec.
            Value::BulkString(bytes) => match FromKeydbValue::from_byte_vec(bytes) {
                Some(x) => Ok(x),
                None => invalid_type_error!(
                    v,
                    format!("Conversion to Vec<{}> failed.", std::any::type_name::<T>())
                ),
            },
            Value::Array(items) => FromKeydbValue::from_keydb_values(items),
            Value::Set(items) => FromKeydbValue::from_keydb_values(items),
            Value::Nil => Ok(vec![]),
            Value::ServerError(err) => Err(err.clone().into()),
            _ => invalid_type_error!(v, "Response type not vector compatible."),
        }
    }
    fn from_owned_keydb_value(v: Value) -> KeydbResult<Vec<T>> {
        match v {
            Value::BulkString(bytes) => FromKeydbValue::from_owned_byte_vec(bytes),
            Value::Array(items) => FromKeydbValue::from_owned_keydb_values(items),
            Value::Set(items) => FromKeydbValue::from_owned_keydb_values(items),
            Value::Nil => Ok(vec![]),
            Value::ServerError(err) => Err(err.into()),
            _ => invalid_type_error!(v, "Response type not vector compatible."),
        }
    }
}

impl<K: FromKeydbValue + Eq + Hash, V: FromKeydbValue, S: BuildHasher + Default> FromKeydbValue
    for HashMap<K, V, S>
{
    fn from_keydb_value(v: &Value) -> KeydbResult<HashMap<K, V, S>> {
        match *v {
            Value::Nil => Ok(Default::default()),
            Value::ServerError(ref err) => Err(err.clone().into()),
            _ => v
                .as_map_iter()
                .ok_or_else(|| {
                    invalid_type_error_inner!(v, "Response type not hashmap compatible")
                })?
                .map(|(k, v)| Ok((from_keydb_value(k)?, from_keydb_value(v)?)))
                .collect(),
        }
    }
    fn from_owned_keydb_value(v: Value) -> KeydbResult<HashMap<K, V, S>> {
        match v {
            Value::Nil => Ok(Default::default()),
            Value::ServerError(err) => Err(err.into()),
            _ => v
                .into_map_iter()
                .map_err(|v| invalid_type_error_inner!(v, "Response type not hashmap compatible"))?
                .map(|(k, v)| Ok((from_owned_keydb_value(k)?, from_owned_keydb_value(v)?)))
                .collect(),
        }
    }
}

impl<T: FromKeydbValue> FromKeydbValue for Option<T> {
    fn from_keydb_value(v: &Value) -> KeydbResult<Option<T>> {
        match *v {
            Value::Nil => Ok(None),
            _ => Ok(Some(from_keydb_value(v)?)),
        }
    }
    fn from_owned_keydb_value(v: Value) -> KeydbResult<Option<T>> {
        match v {
            Value::Nil => Ok(None),
            _ => Ok(Some(from_owned_keydb_value(v)?)),
        }
    }
}

macro_rules! from_keydb_value_for_tuple {
    () => ();
    ($($name:ident,)+) => (
        #[doc(hidden)]
        impl<$($name: FromKeydbValue),*> FromKeydbValue for ($($name,)*) {
            // we have local variables named T1 as dummies and those
            // variables are unused.
            #[allow(non_snake_case, unused_variables)]
            fn from_keydb_value(v: &Value) -> KeydbResult<($($name,)*)> {
                match *v {
                    Value::Array(ref items) => {
                        // hacky way to count the tuple size
                        let mut n = 0;
                        $(let $name = (); n += 1;)*
                        if items.len() != n {
                            invalid_type_error!(v, "Array response of wrong dimension")
                        }

                        // this is pretty ugly too.  The { i += 1; i - 1 }
                        // is rust's postfix increment :)
                        let mut i = 0;
                        Ok(($({let $name = (); from_keydb_value(
                             &items[{ i += 1; i - 1 }])?},)*))
                    }
                    Value::ServerError(ref err) => Err(err.clone().into()),
                    _ => invalid_type_error!(v, "Not an array response")
                }
            }

            #[allow(non_snake_case, unused_variables)]
            fn from_keydb_values(items: &[Value]) -> KeydbResult<Vec<($($name,)*)>> {
                // hacky way to count the tuple size
                let mut n = 0;
                $(let $name = (); n += 1;)*
                if items.len() % n != 0 {
                    invalid_type_error!(items, "Array response of wrong dimension")
                }

                let mut rv = vec![];
                if items.len() == 0 {
                    return Ok(rv)
                }
                for chunk in items.chunks_exact(n) {
                    match chunk {
                        [$($name),*] => rv.push(($(from_keydb_value($name)?),*,)),
                        _ => unreachable!(),
                    }
                }
                Ok(rv)
            }
        }
        from_keydb_value_for_tuple_peel!($($name,)*);
    )
}

/// This chips of the leading one and recurses for the rest.  So if the first
/// iteration was T1, T2, T3 it will recurse to T2, T3.  It stops for tuples
/// of size 1 (does not implement down to unit).
macro_rules! from_keydb_value_for_tuple_peel {
    ($name:ident, $($other:ident,)*) => (from_keydb_value_for_tuple!($($other,)*);)
}

from_keydb_value_for_tuple! { T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, }

impl FromKeydbValue for Value {
    fn from_keydb_value(v: &Value) -> KeydbResult<Value> {
        Ok(v.clone())
    }
    fn from_owned_keydb_value(v: Value) -> KeydbResult<Value> {
        Ok(v)
    }
}

impl FromKeydbValue for () {
    fn from_keydb_value(v: &Value) -> KeydbResult<()> {
        match *v {
            Value::ServerError(ref err) => Err(err.clone().into()),
            _ => Ok(()),
        }
    }
}

/// A shortcut function to invoke `FromKeydbValue::from_keydb_value`
/// to make the API slightly nicer.
pub fn from_keydb_value<T: FromKeydbValue>(v: &Value) -> KeydbResult<T> {
    FromKeydbValue::from_keydb_value(v)
}

/// A shortcut function to invoke `FromKeydbValue::from_owned_keydb_value`
/// to make the API slightly nicer.
pub fn from_owned_keydb_value<T: FromKeydbValue>(v: Value) -> KeydbResult<T> {
    FromKeydbValue::from_owned_keydb_value(v)
}

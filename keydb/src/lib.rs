//! keydb-rs is a Rust implementation of a KeyDB client library.  It exposes
//! a general purpose interface to KeyDB, including the KeyDB-specific
//! commands (subkey expiration and hierarchical hashes) that plain Redis
//! clients do not cover.
//!
//! The crate is called `keydb` and you can depend on it via cargo:
//!
//! ```ini
//! [dependencies.keydb]
//! version = "*"
//! ```
//!
//! # Basic Operation
//!
//! The client holds the connection information and a bounded connection
//! pool.  Each command execution checks a connection out of the pool for
//! one blocking round trip and checks it back in afterwards:
//!
//! ```rust,no_run
//! fn do_something() -> keydb::KeydbResult<()> {
//!     let mut client = keydb::Client::open("keydb://127.0.0.1/")?;
//!
//!     let _: () = keydb::cmd("SET").arg("my_key").arg(42).query(&mut client)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! You can also work on a single connection, bypassing the pool:
//!
//! ```rust,no_run
//! fn do_something() -> keydb::KeydbResult<()> {
//!     let client = keydb::Client::open("keydb://127.0.0.1/")?;
//!     let mut con = client.get_connection()?;
//!
//!     let _: () = keydb::cmd("SET").arg("my_key").arg(42).query(&mut con)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Connection Parameters
//!
//! The parameter to `Client::open` needs to implement the
//! `IntoConnectionInfo` trait, with implementations for string slices in
//! `keydb://` URL format, URL objects and `ConnectionInfo` objects.
//!
//! The URL format is:
//!
//! `{keydb|redis}://[<username>][:<password>@]<hostname>[:port][/<db>]`
//!
//! If Unix socket support is available you can use a unix URL in this
//! format:
//!
//! `keydb+unix:///<path>[?db=<db>[&pass=<password>][&user=<username>]]`
//!
//! ## High-Level Commands
//!
//! The `Commands` trait adds command methods to every connection-like
//! object, including the KeyDB vendor commands:
//!
//! ```rust,no_run
//! use keydb::Commands;
//!
//! fn do_something(con: &mut keydb::Connection) -> keydb::KeydbResult<()> {
//!     let _: () = con.set("fruits", "orange")?;
//!     con.expiremember("fruits", "orange", 30)?;
//!     Ok(())
//! }
//! ```
//!
//! # Pipelining
//!
//! Command pipelines send multiple commands in one batch and read the
//! replies back in order.  With `atomic()` the batch is wrapped in a
//! server-side transaction:
//!
//! ```rust,no_run
//! # fn do_something() -> keydb::KeydbResult<()> {
//! # let client = keydb::Client::open("keydb://127.0.0.1/").unwrap();
//! # let mut con = client.get_connection().unwrap();
//! let (k1, k2): (i32, i32) = keydb::pipe()
//!     .atomic()
//!     .cmd("SET").arg("key_1").arg(42).ignore()
//!     .cmd("SET").arg("key_2").arg(43).ignore()
//!     .cmd("GET").arg("key_1")
//!     .cmd("GET").arg("key_2").query(&mut con)?;
//! # Ok(()) }
//! ```
//!
//! # Hierarchical Hashes
//!
//! KeyDB's hierarchical hashes are addressed by dot-separated paths.  The
//! [`Nested`] type models the nested form; flat `(path, value)` lists are
//! accepted as an equivalent input:
//!
//! ```rust,no_run
//! use keydb::{Commands, Nested};
//!
//! # fn do_something(con: &mut keydb::Connection) -> keydb::KeydbResult<()> {
//! let profile = Nested::node().with("name", "ada").with("visits", 1);
//! con.nhset("user:1", &profile)?;
//! let name = con.nhget("user:1.name")?;
//! # Ok(()) }
//! ```

#![deny(non_camel_case_types)]
#![warn(missing_docs)]

// public api
pub use crate::client::{Client, Config};
pub use crate::cmd::{cmd, pack_command, pipe, Cmd};
pub use crate::commands::{Commands, ExpireUnit};
pub use crate::connection::{
    connect, parse_keydb_url, Connection, ConnectionAddr, ConnectionInfo, ConnectionLike,
    ConnectionState, IntoConnectionInfo,
};
pub use crate::nested::Nested;
pub use crate::parser::{parse_keydb_value, FrameDecoder, Parser};
pub use crate::pipeline::Pipeline;
pub use crate::pool::{ConnectionPool, PoolState, PooledConnection};

// preserve grouping and order
#[rustfmt::skip]
pub use crate::types::{
    // utility functions
    from_keydb_value,
    from_owned_keydb_value,
    make_extension_error,

    // error kinds
    ErrorKind,
    ServerError,
    ServerErrorKind,

    // conversion traits
    FromKeydbValue,

    // error and result types
    KeydbError,
    KeydbResult,
    KeydbWrite,
    ToKeydbArgs,

    // low level values
    Value,
    MapIter,
    OwnedMapIter,
};

mod macros;

mod client;
mod cmd;
mod commands;
mod connection;
mod nested;
mod parser;
mod pipeline;
mod pool;
mod types;

use std::time::Duration;

use crate::cmd::Cmd;
use crate::connection::{connect, Connection, ConnectionInfo, ConnectionLike, IntoConnectionInfo};
use crate::pipeline::Pipeline;
use crate::pool::{ConnectionPool, PoolState, PooledConnection};
use crate::types::{KeydbResult, Value};

/// Client behavior knobs.
///
/// `timeout` covers the connect, read, write and pool-acquire deadlines of
/// the connections the client manages; `None` blocks without bound.
#[derive(Clone, Debug)]
pub struct Config {
    /// Deadline applied to connect, read/write and pool acquire calls.
    pub timeout: Option<Duration>,
    /// Upper bound on the number of live connections in the pool.
    pub max_pool_size: u32,
    /// Idle connections older than this are evicted on the next acquire.
    pub idle_timeout: Option<Duration>,
    /// Whether [`Client::pipeline`] starts out with the transaction
    /// marker set.
    pub use_transaction_by_default: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            timeout: None,
            max_pool_size: 16,
            idle_timeout: None,
            use_transaction_by_default: true,
        }
    }
}

/// The client type.
///
/// The client holds the connection information and a bounded connection
/// pool.  Command execution checks a connection out of the pool for
/// exactly one round trip and checks it back in afterwards, so a client
/// can be shared freely between threads.
#[derive(Clone)]
pub struct Client {
    connection_info: ConnectionInfo,
    config: Config,
    pool: ConnectionPool,
}

/// The client acts as dispatcher to the server.  Commands are built with
/// [`cmd`](crate::cmd) or through the [`Commands`](crate::Commands)
/// convenience trait and executed against the client directly:
///
/// ```rust,no_run
/// use keydb::Commands;
///
/// let mut client = keydb::Client::open("keydb://127.0.0.1/").unwrap();
/// let _: () = client.set("my_key", 42).unwrap();
/// ```
impl Client {
    /// Connects to a server and returns a client.  This does not
    /// actually open a connection yet but it does perform some basic
    /// checks on the URL that might make the operation fail.
    pub fn open<T: IntoConnectionInfo>(params: T) -> KeydbResult<Client> {
        Client::open_with_config(params, Config::default())
    }

    /// Like [`open`](Client::open), with explicit behavior knobs.
    pub fn open_with_config<T: IntoConnectionInfo>(
        params: T,
        config: Config,
    ) -> KeydbResult<Client> {
        let connection_info = params.into_connection_info()?;
        let pool = ConnectionPool::new(connection_info.clone(), &config);
        Ok(Client {
            connection_info,
            config,
            pool,
        })
    }

    /// Opens a new standalone connection, bypassing the pool.  The
    /// connection object can be used to send commands to the server.
    /// This can fail with a variety of errors (like unreachable host) so
    /// it's important that you handle those errors.
    pub fn get_connection(&self) -> KeydbResult<Connection> {
        connect(&self.connection_info, self.config.timeout)
    }

    /// Checks a connection out of the pool, creating one if needed and
    /// blocking up to the configured timeout when the pool is at
    /// capacity.  The connection is checked back in when the returned
    /// guard drops.
    pub fn acquire(&self) -> KeydbResult<PooledConnection> {
        self.pool.acquire(self.config.timeout)
    }

    /// Executes one command over a pooled connection and returns its
    /// reply.
    ///
    /// The connection is released in every case: on success, and on
    /// failure after Broken-connection cleanup.  Error replies are
    /// returned as [`Value::ServerError`]; use
    /// [`Value::extract_error`] or a typed [`Cmd::query`] to raise them.
    pub fn execute(&self, cmd: &Cmd) -> KeydbResult<Value> {
        let mut conn = self.acquire()?;
        conn.req_command(cmd)
    }

    /// Creates a new pipeline.  The transaction marker starts out set when
    /// the client was configured with `use_transaction_by_default`.
    pub fn pipeline(&self) -> Pipeline {
        let mut pipe = Pipeline::new();
        if self.config.use_transaction_by_default {
            pipe.atomic();
        }
        pipe
    }

    /// Returns a reference of client connection info object.
    pub fn get_connection_info(&self) -> &ConnectionInfo {
        &self.connection_info
    }

    /// Returns the pool handle, mainly useful for inspecting its
    /// [`state`](ConnectionPool::state).
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Returns the pool's bookkeeping counters.
    pub fn pool_state(&self) -> PoolState {
        self.pool.state()
    }
}

impl ConnectionLike for Client {
    fn req_packed_command(&mut self, cmd: &[u8]) -> KeydbResult<Value> {
        let mut conn = self.acquire()?;
        conn.req_packed_command(cmd)
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        offset: usize,
        count: usize,
    ) -> KeydbResult<Vec<Value>> {
        let mut conn = self.acquire()?;
        conn.req_packed_commands(cmd, offset, count)
    }

    fn get_db(&self) -> i64 {
        self.connection_info.db
    }

    fn check_connection(&mut self) -> bool {
        match self.acquire() {
            Ok(mut conn) => conn.check_connection(),
            Err(_) => false,
        }
    }

    fn is_open(&self) -> bool {
        true
    }
}

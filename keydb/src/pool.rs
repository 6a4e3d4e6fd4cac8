use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::debug;

use crate::client::Config;
use crate::connection::{connect, Connection, ConnectionInfo, ConnectionLike};
use crate::types::{ErrorKind, KeydbResult};

/// A bounded pool of connections to one server.
///
/// The pool owns every connection it has created.  While idle, a
/// connection sits in the pool's idle set; while checked out it is owned
/// exclusively by one caller through the [`PooledConnection`] guard and
/// comes back on drop.  A connection is destroyed only by the pool: when
/// it comes back broken, when it has sat idle for longer than the idle
/// timeout, or when the pool itself is dropped.
///
/// The handle is cheap to clone and safe to share between threads; all
/// idle-set bookkeeping happens inside one critical section per acquire
/// or release.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<SharedPool>,
}

struct SharedPool {
    info: ConnectionInfo,
    max_size: u32,
    idle_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    internals: Mutex<PoolInternals>,
    cond: Condvar,
}

struct PoolInternals {
    idle: Vec<IdleConnection>,
    // connections created minus connections destroyed, i.e. idle + checked out
    num_open: u32,
}

struct IdleConnection {
    conn: Connection,
    idle_since: Instant,
}

/// A point-in-time snapshot of the pool's bookkeeping counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolState {
    /// Connections currently alive, idle and checked out together.
    pub connections: u32,
    /// Connections currently sitting in the idle set.
    pub idle: u32,
}

impl ConnectionPool {
    /// Creates a new pool for the given connection info.  No connection is
    /// opened until the first [`acquire`](ConnectionPool::acquire).
    pub fn new(info: ConnectionInfo, config: &Config) -> ConnectionPool {
        ConnectionPool {
            inner: Arc::new(SharedPool {
                info,
                max_size: config.max_pool_size.max(1),
                idle_timeout: config.idle_timeout,
                io_timeout: config.timeout,
                internals: Mutex::new(PoolInternals {
                    idle: Vec::new(),
                    num_open: 0,
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Checks one connection out of the pool.
    ///
    /// An open idle connection is reused when available; otherwise a new
    /// one is created as long as the pool is below its maximum size.  At
    /// capacity the call blocks until a connection is checked back in, up
    /// to `timeout`: passing `Duration::ZERO` fails immediately, passing
    /// `None` blocks without bound.  On timeout the call fails with
    /// `ErrorKind::PoolExhausted` and no connection is leaked.
    pub fn acquire(&self, timeout: Option<Duration>) -> KeydbResult<PooledConnection> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut internals = self.inner.internals.lock().unwrap();
        loop {
            evict_stale(&self.inner, &mut internals);

            if let Some(idle) = internals.idle.pop() {
                return Ok(PooledConnection::new(self.inner.clone(), idle.conn));
            }

            if internals.num_open < self.inner.max_size {
                internals.num_open += 1;
                drop(internals);
                return match self.connect_one() {
                    Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
                    Err(err) => {
                        let mut internals = self.inner.internals.lock().unwrap();
                        internals.num_open -= 1;
                        self.inner.cond.notify_one();
                        Err(err)
                    }
                };
            }

            internals = match deadline {
                None => self.inner.cond.wait(internals).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        fail!((
                            ErrorKind::PoolExhausted,
                            "No connection available within the acquire timeout"
                        ));
                    }
                    let (internals, _) = self
                        .inner
                        .cond
                        .wait_timeout(internals, deadline - now)
                        .unwrap();
                    internals
                }
            };
        }
    }

    /// Returns the pool's current bookkeeping counters.
    pub fn state(&self) -> PoolState {
        let internals = self.inner.internals.lock().unwrap();
        PoolState {
            connections: internals.num_open,
            idle: internals.idle.len() as u32,
        }
    }

    /// Closes every idle connection.  Checked out connections are
    /// destroyed as they come back.
    pub fn clear_idle(&self) {
        let mut internals = self.inner.internals.lock().unwrap();
        let drained = internals.idle.len();
        for mut idle in internals.idle.drain(..) {
            idle.conn.close();
        }
        internals.num_open -= drained as u32;
        self.inner.cond.notify_all();
    }

    fn connect_one(&self) -> KeydbResult<Connection> {
        let conn = connect(&self.inner.info, self.inner.io_timeout)?;
        conn.set_read_timeout(self.inner.io_timeout)?;
        conn.set_write_timeout(self.inner.io_timeout)?;
        Ok(conn)
    }
}

fn evict_stale(shared: &SharedPool, internals: &mut PoolInternals) {
    let before = internals.idle.len();
    let idle_timeout = shared.idle_timeout;
    internals.idle.retain(|idle| {
        idle.conn.is_open() && idle_timeout.map_or(true, |max| idle.idle_since.elapsed() < max)
    });
    let evicted = before - internals.idle.len();
    if evicted > 0 {
        internals.num_open -= evicted as u32;
        debug!("evicted {evicted} stale idle connection(s)");
    }
}

fn check_in(shared: &SharedPool, conn: Connection) {
    let mut internals = shared.internals.lock().unwrap();
    if conn.is_open() {
        internals.idle.push(IdleConnection {
            conn,
            idle_since: Instant::now(),
        });
    } else {
        // broken or closed mid checkout, never reuse it
        internals.num_open -= 1;
        debug!("discarding connection returned in state {:?}", conn.state());
    }
    shared.cond.notify_one();
}

/// A smart pointer wrapping a checked-out connection.
///
/// Derefs to [`Connection`] and checks the connection back into the pool
/// on drop, which guarantees the release half of the checkout/checkin
/// discipline runs on every path, including early returns and panics.
pub struct PooledConnection {
    pool: Arc<SharedPool>,
    conn: Option<Connection>,
}

impl PooledConnection {
    fn new(pool: Arc<SharedPool>, conn: Connection) -> PooledConnection {
        PooledConnection {
            pool,
            conn: Some(conn),
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().unwrap()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            check_in(&self.pool, conn);
        }
    }
}

use crate::cmd::cmd;
use crate::connection::ConnectionLike;
use crate::nested::Nested;
use crate::pipeline::Pipeline;
use crate::types::{
    ErrorKind, FromKeydbValue, KeydbResult, KeydbWrite, ToKeydbArgs, Value,
};

/// The time unit accepted by `EXPIREMEMBER`.
///
/// The wire protocol spells these `s` and `ms`; anything else is rejected
/// by the server, so the unit is a type here rather than a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpireUnit {
    /// Delay is given in seconds.
    Seconds,
    /// Delay is given in milliseconds.
    Milliseconds,
}

impl ToKeydbArgs for ExpireUnit {
    fn write_keydb_args<W>(&self, out: &mut W)
    where
        W: ?Sized + KeydbWrite,
    {
        out.write_arg(match self {
            ExpireUnit::Seconds => b"s",
            ExpireUnit::Milliseconds => b"ms",
        })
    }
}

/// Implements common commands as methods on everything that can execute
/// commands.
///
/// This is the extension point for vendor commands: each method is a thin
/// named wrapper that builds a [`Cmd`](crate::Cmd) and funnels it through
/// the generic execute path, so new commands compose statically on top of
/// the core instead of modifying it.  The blanket implementation makes
/// the methods available on [`Connection`](crate::Connection), pooled
/// connections and [`Client`](crate::Client) alike.
///
/// ```rust,no_run
/// use keydb::Commands;
///
/// let mut client = keydb::Client::open("keydb://127.0.0.1/").unwrap();
/// let _: () = client.set("fruit", "orange").unwrap();
/// let who: String = client.get("fruit").unwrap();
/// ```
pub trait Commands: ConnectionLike + Sized {
    /// Sends a ping to the server.
    fn ping(&mut self) -> KeydbResult<String> {
        cmd("PING").query(self)
    }

    /// Get the value of a key.
    fn get<K: ToKeydbArgs, RV: FromKeydbValue>(&mut self, key: K) -> KeydbResult<RV> {
        cmd("GET").arg(key).query(self)
    }

    /// Set the string value of a key.
    fn set<K: ToKeydbArgs, V: ToKeydbArgs>(&mut self, key: K, value: V) -> KeydbResult<()> {
        cmd("SET").arg(key).arg(value).query(self)
    }

    /// Delete one or more keys.
    fn del<K: ToKeydbArgs, RV: FromKeydbValue>(&mut self, key: K) -> KeydbResult<RV> {
        cmd("DEL").arg(key).query(self)
    }

    /// Determine if one or more keys exist.
    fn exists<K: ToKeydbArgs, RV: FromKeydbValue>(&mut self, key: K) -> KeydbResult<RV> {
        cmd("EXISTS").arg(key).query(self)
    }

    /// Add one or more members to a set.
    fn sadd<K: ToKeydbArgs, M: ToKeydbArgs, RV: FromKeydbValue>(
        &mut self,
        key: K,
        member: M,
    ) -> KeydbResult<RV> {
        cmd("SADD").arg(key).arg(member).query(self)
    }

    /// Get all the members of a set.
    fn smembers<K: ToKeydbArgs, RV: FromKeydbValue>(&mut self, key: K) -> KeydbResult<RV> {
        cmd("SMEMBERS").arg(key).query(self)
    }

    /// Set a timeout, in seconds, on a single member of a set-like key.
    /// This command is only available on KeyDB.
    ///
    /// Returns 1 if the timeout was set, 0 otherwise.
    fn expiremember<K: ToKeydbArgs, M: ToKeydbArgs>(
        &mut self,
        key: K,
        subkey: M,
        delay: i64,
    ) -> KeydbResult<i64> {
        cmd("EXPIREMEMBER").arg(key).arg(subkey).arg(delay).query(self)
    }

    /// Like [`expiremember`](Commands::expiremember) with an explicit
    /// delay unit.
    fn expiremember_in<K: ToKeydbArgs, M: ToKeydbArgs>(
        &mut self,
        key: K,
        subkey: M,
        delay: i64,
        unit: ExpireUnit,
    ) -> KeydbResult<i64> {
        cmd("EXPIREMEMBER")
            .arg(key)
            .arg(subkey)
            .arg(delay)
            .arg(unit)
            .query(self)
    }

    /// Set a timeout on a single member of a set-like key as an absolute
    /// unix timestamp instead of a delay.  This command is only available
    /// on KeyDB.
    fn expirememberat<K: ToKeydbArgs, M: ToKeydbArgs>(
        &mut self,
        key: K,
        subkey: M,
        timestamp: i64,
    ) -> KeydbResult<i64> {
        cmd("EXPIREMEMBERAT")
            .arg(key)
            .arg(subkey)
            .arg(timestamp)
            .query(self)
    }

    /// Read a hierarchical hash, addressed by its dot-separated path.
    /// This command is only available on KeyDB servers with the
    /// hierarchical hash extension.
    fn nhget<P: ToKeydbArgs>(&mut self, path: P) -> KeydbResult<Value> {
        cmd("NHGET").arg(path).query(self)
    }

    /// Write a hierarchical hash under `key` from a nested value.
    ///
    /// The value is flattened into one `NHSET` per leaf, addressed by its
    /// full dotted path, and the writes are flushed over a single
    /// non-transactional pipeline.  Returns the per-leaf replies in write
    /// order.
    fn nhset<K: AsRef<str>>(&mut self, key: K, value: &Nested) -> KeydbResult<Vec<Value>> {
        queue_leaf_writes(self, value.flatten(key.as_ref()))
    }

    /// Write a hierarchical hash from a flat list of `(path, value)`
    /// pairs, where each path is already the full dotted path of a leaf.
    ///
    /// Equivalent inputs in this form and in the nested form of
    /// [`nhset`](Commands::nhset) produce identical server-visible
    /// writes.
    fn nhset_flat<P: AsRef<str>, V: ToKeydbArgs>(
        &mut self,
        leaves: &[(P, V)],
    ) -> KeydbResult<Vec<Value>> {
        let mut flattened = Vec::with_capacity(leaves.len());
        for (path, value) in leaves {
            let mut args = value.to_keydb_args();
            if args.len() != 1 {
                fail!((
                    ErrorKind::EncodingError,
                    "A hierarchical hash leaf must encode to exactly one argument"
                ));
            }
            flattened.push((path.as_ref().to_string(), args.pop().unwrap()));
        }
        queue_leaf_writes(self, flattened)
    }
}

fn queue_leaf_writes<C: ConnectionLike>(
    con: &mut C,
    leaves: Vec<(String, Vec<u8>)>,
) -> KeydbResult<Vec<Value>> {
    if leaves.is_empty() {
        return Ok(vec![]);
    }
    let mut pipe = Pipeline::with_capacity(leaves.len());
    for (path, value) in &leaves {
        pipe.cmd("NHSET").arg(path.as_str()).arg(value.as_slice());
    }
    pipe.execute(con)
}

impl<T> Commands for T where T: ConnectionLike {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_unit_encodes_the_wire_tokens() {
        assert_eq!(ExpireUnit::Seconds.to_keydb_args(), vec![b"s".to_vec()]);
        assert_eq!(
            ExpireUnit::Milliseconds.to_keydb_args(),
            vec![b"ms".to_vec()]
        );
    }
}

use std::collections::HashSet;

use crate::cmd::{cmd, cmd_len, Cmd};
use crate::connection::ConnectionLike;
use crate::types::{
    from_owned_keydb_value, ErrorKind, FromKeydbValue, KeydbError, KeydbResult, ToKeydbArgs, Value,
};

/// Represents a command pipeline.
///
/// A pipeline buffers a sequence of commands in Building state, sends them
/// as one batch on [`execute`](Pipeline::execute) and demultiplexes the
/// replies back in submission order.  After a successful flush the buffer
/// is discarded (Completed); [`reset`](Pipeline::reset) discards it early
/// and returns to Building.
#[derive(Clone)]
pub struct Pipeline {
    commands: Vec<Cmd>,
    transaction_mode: bool,
    ignored_commands: HashSet<usize>,
}

/// A pipeline allows you to send multiple commands in one go to the
/// server.  API wise it's very similar to just using a command
/// but it allows multiple commands to be chained.
///
/// Basic example:
///
/// ```rust,no_run
/// # let client = keydb::Client::open("keydb://127.0.0.1/").unwrap();
/// # let mut con = client.get_connection().unwrap();
/// let ((k1, k2),) : ((i32, i32),) = keydb::pipe()
///     .cmd("SET").arg("key_1").arg(42).ignore()
///     .cmd("SET").arg("key_2").arg(43).ignore()
///     .cmd("MGET").arg(&["key_1", "key_2"]).query(&mut con).unwrap();
/// ```
///
/// As you can see with `cmd` you can start a new command.  By default
/// each command produces a value but for some you can ignore them by
/// calling `ignore` on the command.  That way it will be skipped in the
/// return value which is useful for `SET` commands and others, which
/// do not have a useful return value.
impl Pipeline {
    /// Creates an empty pipeline.  For consistency with the `cmd`
    /// api a `pipe` function is provided as alias.
    pub fn new() -> Pipeline {
        Self::with_capacity(0)
    }

    /// Creates an empty pipeline with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Pipeline {
        Pipeline {
            commands: Vec::with_capacity(capacity),
            transaction_mode: false,
            ignored_commands: HashSet::new(),
        }
    }

    /// This enables atomic mode.  In atomic mode the whole pipeline is
    /// enclosed in `MULTI`/`EXEC`.  From the user's point of view nothing
    /// changes however.  This is easier than using `MULTI`/`EXEC` yourself
    /// as the format does not change.
    ///
    /// ```rust,no_run
    /// # let client = keydb::Client::open("keydb://127.0.0.1/").unwrap();
    /// # let mut con = client.get_connection().unwrap();
    /// let (k1, k2) : (i32, i32) = keydb::pipe()
    ///     .atomic()
    ///     .cmd("GET").arg("key_1")
    ///     .cmd("GET").arg("key_2").query(&mut con).unwrap();
    /// ```
    #[inline]
    pub fn atomic(&mut self) -> &mut Pipeline {
        self.transaction_mode = true;
        self
    }

    /// Returns whether the transaction marker is set.
    #[inline]
    pub fn is_atomic(&self) -> bool {
        self.transaction_mode
    }

    /// Adds a command to the pipeline.
    #[inline]
    pub fn add_command(&mut self, cmd: Cmd) -> &mut Self {
        self.commands.push(cmd);
        self
    }

    /// Starts a new command. Functions such as `arg` then become
    /// available to add more arguments to that command.
    #[inline]
    pub fn cmd(&mut self, name: &str) -> &mut Self {
        self.add_command(cmd(name))
    }

    /// Returns an iterator over all the commands currently in this pipeline.
    pub fn cmd_iter(&self) -> impl Iterator<Item = &Cmd> {
        self.commands.iter()
    }

    /// Instructs the pipeline to ignore the return value of this command.
    /// It will still be ensured that it is not an error, but any successful
    /// result is just thrown away.  This makes result processing through
    /// tuples much easier because you do not need to handle all the items
    /// you do not care about.
    #[inline]
    pub fn ignore(&mut self) -> &mut Self {
        match self.commands.len() {
            0 => true,
            x => self.ignored_commands.insert(x - 1),
        };
        self
    }

    /// Adds an argument to the last started command. This works similar
    /// to the `arg` method of the `Cmd` object.
    ///
    /// Note that this function fails the task if executed on an empty pipeline.
    #[inline]
    pub fn arg<T: ToKeydbArgs>(&mut self, arg: T) -> &mut Self {
        {
            let cmd = self.get_last_command();
            cmd.arg(arg);
        }
        self
    }

    /// Discards all buffered commands and returns the pipeline to its
    /// Building state, keeping the transaction marker.
    #[inline]
    pub fn reset(&mut self) {
        self.commands.clear();
        self.ignored_commands.clear();
    }

    /// Returns the number of buffered commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if the pipeline has no buffered commands.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns the encoded pipeline commands, with transaction framing
    /// when the transaction marker is set.
    pub fn get_packed_pipeline(&self) -> Vec<u8> {
        encode_pipeline(&self.commands, self.transaction_mode)
    }

    fn execute_pipelined(&self, con: &mut dyn ConnectionLike) -> KeydbResult<Vec<Value>> {
        let resp = con.req_packed_commands(
            &encode_pipeline(&self.commands, false),
            0,
            self.commands.len(),
        )?;
        Ok(self.filter_ignored(resp))
    }

    fn execute_transaction(&self, con: &mut dyn ConnectionLike) -> KeydbResult<Vec<Value>> {
        // Read everything back: the MULTI ack, one queue ack per command
        // and the final EXEC reply.  The queue acks are the diagnostics a
        // caller gets when the transaction aborts.
        let mut resp = con.req_packed_commands(
            &encode_pipeline(&self.commands, true),
            0,
            self.commands.len() + 2,
        )?;
        let exec = match resp.pop() {
            Some(value) => value,
            None => fail!((
                ErrorKind::ResponseError,
                "Missing EXEC reply in transaction response"
            )),
        };
        let queued: Vec<Value> = resp.drain(1..).collect();

        let queue_failed = queued.iter().any(|v| matches!(v, Value::ServerError(_)))
            || matches!(resp.first(), Some(Value::ServerError(_)));

        match exec {
            Value::Array(items) if !queue_failed => Ok(self.filter_ignored(items)),
            // nil EXEC or an EXECABORT-style error both mean the server
            // rolled the whole batch back
            Value::Nil | Value::ServerError(_) => Err(KeydbError::transaction_aborted(queued)),
            _ if queue_failed => Err(KeydbError::transaction_aborted(queued)),
            _ => fail!((
                ErrorKind::ResponseError,
                "Invalid response when parsing multi response"
            )),
        }
    }

    /// Flushes the buffered commands over the given connection as a single
    /// write and returns the ordered sequence of replies.
    ///
    /// Without the transaction marker each command succeeds or fails
    /// independently: a failing command shows up in the returned sequence
    /// as a [`Value::ServerError`] for the caller to inspect.  With the
    /// marker set a server-side failure aborts the whole batch with a
    /// `TransactionAborted` error carrying the per-command queue replies.
    ///
    /// On success the pipeline buffer is discarded; on failure it is kept
    /// so the caller can inspect or [`reset`](Pipeline::reset) it.
    pub fn execute(&mut self, con: &mut dyn ConnectionLike) -> KeydbResult<Vec<Value>> {
        let results = if self.commands.is_empty() {
            vec![]
        } else if self.transaction_mode {
            self.execute_transaction(con)?
        } else {
            self.execute_pipelined(con)?
        };
        self.reset();
        Ok(results)
    }

    /// Executes the pipeline and fetches the return values converted into
    /// the target type.  Since most pipelines return different types it's
    /// recommended to use tuple matching to process the results.
    ///
    /// Unlike [`execute`](Pipeline::execute) this treats any error reply in
    /// the batch as a failure of the whole query, and it does not discard
    /// the buffered commands, so a pipeline can be queried repeatedly.
    #[inline]
    pub fn query<T: FromKeydbValue>(&self, con: &mut dyn ConnectionLike) -> KeydbResult<T> {
        let results = if self.commands.is_empty() {
            vec![]
        } else if self.transaction_mode {
            self.execute_transaction(con)?
        } else {
            self.execute_pipelined(con)?
        };
        from_owned_keydb_value(Value::Array(results).extract_error()?)
    }

    #[inline]
    fn get_last_command(&mut self) -> &mut Cmd {
        let idx = match self.commands.len() {
            0 => panic!("No command on stack"),
            x => x - 1,
        };
        &mut self.commands[idx]
    }

    fn filter_ignored(&self, resp: Vec<Value>) -> Vec<Value> {
        let mut rv = vec![];
        for (idx, result) in resp.into_iter().enumerate() {
            if !self.ignored_commands.contains(&idx) {
                rv.push(result);
            }
        }
        rv
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

const MULTI_COMMAND: &[u8] = "*1\r\n$5\r\nMULTI\r\n".as_bytes();
const EXEC_COMMAND: &[u8] = "*1\r\n$4\r\nEXEC\r\n".as_bytes();

fn pipeline_length(cmds: &[Cmd], atomic: bool) -> usize {
    let cmds_len = cmds.iter().map(cmd_len).sum();
    if atomic {
        cmds_len + MULTI_COMMAND.len() + EXEC_COMMAND.len()
    } else {
        cmds_len
    }
}

fn encode_pipeline(cmds: &[Cmd], atomic: bool) -> Vec<u8> {
    let mut rv = Vec::with_capacity(pipeline_length(cmds, atomic));
    if atomic {
        rv.extend_from_slice(MULTI_COMMAND);
        for cmd in cmds {
            cmd.write_packed_command_preallocated(&mut rv);
        }
        rv.extend_from_slice(EXEC_COMMAND);
    } else {
        for cmd in cmds {
            cmd.write_packed_command_preallocated(&mut rv);
        }
    }
    rv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_plain_pipeline_back_to_back() {
        let mut pipe = Pipeline::new();
        pipe.cmd("SET").arg("a").arg(1).cmd("GET").arg("a");
        assert_eq!(
            pipe.get_packed_pipeline(),
            b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n*2\r\n$3\r\nGET\r\n$1\r\na\r\n".to_vec()
        );
    }

    #[test]
    fn packs_transaction_framing_around_the_batch() {
        let mut pipe = Pipeline::new();
        pipe.atomic().cmd("GET").arg("a");
        let packed = pipe.get_packed_pipeline();
        assert!(packed.starts_with(MULTI_COMMAND));
        assert!(packed.ends_with(EXEC_COMMAND));
    }

    #[test]
    fn reset_returns_to_building() {
        let mut pipe = Pipeline::new();
        pipe.atomic().cmd("GET").arg("a").ignore();
        pipe.reset();
        assert!(pipe.is_empty());
        // the transaction marker survives a reset
        assert!(pipe.is_atomic());
    }
}

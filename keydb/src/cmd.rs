use std::io;

use crate::connection::ConnectionLike;
use crate::pipeline::Pipeline;
use crate::types::{
    from_owned_keydb_value, FromKeydbValue, KeydbResult, KeydbWrite, ToKeydbArgs,
};

/// Represents a single command with its arguments.
///
/// The arguments are stored back to back in one byte buffer together with
/// the offsets that mark where each argument ends, so that a built command
/// can be packed onto the wire without another copy.  A command is
/// immutable once it has been handed to a connection or a pipeline.
#[derive(Clone, Default)]
pub struct Cmd {
    data: Vec<u8>,
    // each entry is the offset that marks the end of the argument
    args: Vec<usize>,
}

fn countdigits(mut v: usize) -> usize {
    let mut result = 1;
    loop {
        if v < 10 {
            return result;
        }
        if v < 100 {
            return result + 1;
        }
        if v < 1000 {
            return result + 2;
        }
        if v < 10000 {
            return result + 3;
        }

        v /= 10000;
        result += 4;
    }
}

#[inline]
fn bulklen(len: usize) -> usize {
    1 + countdigits(len) + 2 + len + 2
}

fn args_len<'a, I>(args: I) -> usize
where
    I: IntoIterator<Item = &'a [u8]> + ExactSizeIterator,
{
    let mut totlen = 1 + countdigits(args.len()) + 2;
    for item in args {
        totlen += bulklen(item.len());
    }
    totlen
}

pub(crate) fn cmd_len(cmd: &Cmd) -> usize {
    args_len(cmd.args_iter())
}

fn encode_command<'a, I>(args: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]> + Clone + ExactSizeIterator,
{
    let mut cmd = Vec::new();
    write_command_to_vec(&mut cmd, args);
    cmd
}

fn write_command_to_vec<'a, I>(cmd: &mut Vec<u8>, args: I)
where
    I: IntoIterator<Item = &'a [u8]> + Clone + ExactSizeIterator,
{
    let totlen = args_len(args.clone());

    cmd.reserve(totlen);

    write_command(cmd, args).unwrap()
}

fn write_command<'a, I>(cmd: &mut (impl ?Sized + io::Write), args: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a [u8]> + Clone + ExactSizeIterator,
{
    let mut buf = ::itoa::Buffer::new();

    cmd.write_all(b"*")?;
    let s = buf.format(args.len());
    cmd.write_all(s.as_bytes())?;
    cmd.write_all(b"\r\n")?;

    for item in args {
        cmd.write_all(b"$")?;
        let s = buf.format(item.len());
        cmd.write_all(s.as_bytes())?;
        cmd.write_all(b"\r\n")?;

        cmd.write_all(item)?;
        cmd.write_all(b"\r\n")?;
    }
    Ok(())
}

impl KeydbWrite for Cmd {
    fn write_arg(&mut self, arg: &[u8]) {
        self.data.extend_from_slice(arg);
        self.args.push(self.data.len());
    }

    fn write_arg_fmt(&mut self, arg: impl std::fmt::Display) {
        use std::io::Write;
        write!(self.data, "{arg}").unwrap();
        self.args.push(self.data.len());
    }
}

/// A command acts as a builder interface to creating encoded requests.
/// This allows you to easily assemble a packed command by chaining
/// arguments together.
///
/// Basic example:
///
/// ```rust
/// keydb::Cmd::new().arg("SET").arg("my_key").arg(42);
/// ```
///
/// There is also a helper function called `cmd` which makes it a
/// tiny bit shorter:
///
/// ```rust
/// keydb::cmd("SET").arg("my_key").arg(42);
/// ```
impl Cmd {
    /// Creates a new empty command.
    pub fn new() -> Cmd {
        Cmd::default()
    }

    /// Creates a new empty command, with at least the requested capacity.
    pub fn with_capacity(arg_count: usize, size_of_data: usize) -> Cmd {
        Cmd {
            data: Vec::with_capacity(size_of_data),
            args: Vec::with_capacity(arg_count),
        }
    }

    /// Appends an argument to the command.  The argument passed must
    /// be a type that implements `ToKeydbArgs`.  Most primitive types as
    /// well as vectors of primitive types implement it.
    ///
    /// For instance all of the following are valid:
    ///
    /// ```rust
    /// keydb::cmd("SET").arg(&["my_key", "my_value"]);
    /// keydb::cmd("SET").arg("my_key").arg(42);
    /// keydb::cmd("SET").arg("my_key").arg(b"my_value");
    /// ```
    #[inline]
    pub fn arg<T: ToKeydbArgs>(&mut self, arg: T) -> &mut Cmd {
        arg.write_keydb_args(self);
        self
    }

    /// Returns the packed command as a byte vector.
    #[inline]
    pub fn get_packed_command(&self) -> Vec<u8> {
        let mut cmd = Vec::new();
        self.write_packed_command(&mut cmd);
        cmd
    }

    pub(crate) fn write_packed_command(&self, cmd: &mut Vec<u8>) {
        write_command_to_vec(cmd, self.args_iter())
    }

    pub(crate) fn write_packed_command_preallocated(&self, cmd: &mut Vec<u8>) {
        write_command(cmd, self.args_iter()).unwrap()
    }

    /// Returns true if no arguments were appended yet.  An empty command
    /// cannot be encoded onto the wire.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Sends the command as query to the connection and converts the
    /// result to the target value.  This is the general way how
    /// you can retrieve data.
    #[inline]
    pub fn query<T: FromKeydbValue>(&self, con: &mut dyn ConnectionLike) -> KeydbResult<T> {
        match con.req_command(self) {
            Ok(val) => from_owned_keydb_value(val.extract_error()?),
            Err(e) => Err(e),
        }
    }

    /// This is a shortcut to `query()` that does not return a value and
    /// fails if the query fails because of an error.  This is
    /// mainly useful in examples and for simple commands like setting
    /// keys.
    ///
    /// This is equivalent to a call of query like this:
    ///
    /// ```rust,no_run
    /// # let client = keydb::Client::open("keydb://127.0.0.1/").unwrap();
    /// # let mut con = client.get_connection().unwrap();
    /// let _ : () = keydb::cmd("PING").query(&mut con).unwrap();
    /// ```
    #[inline]
    pub fn exec(&self, con: &mut dyn ConnectionLike) -> KeydbResult<()> {
        self.query::<()>(con)
    }

    /// Returns an iterator over all the arguments in this command
    /// (including the command name itself).
    pub fn args_iter(&self) -> impl Clone + ExactSizeIterator<Item = &[u8]> {
        let mut prev = 0;
        self.args.iter().map(move |&end| {
            let arg = &self.data[prev..end];
            prev = end;
            arg
        })
    }
}

/// Shortcut function to creating a command with a single argument.
///
/// The first argument of a command is always the name of the command
/// which needs to be a string.  This is the recommended way to start a
/// command pipe.
///
/// ```rust
/// keydb::cmd("PING");
/// ```
pub fn cmd(name: &str) -> Cmd {
    let mut rv = Cmd::new();
    rv.arg(name);
    rv
}

/// Packs a bunch of arguments into a single request frame.  This is
/// generally a quite useless function as this functionality is nicely
/// wrapped through the `Cmd` object, but in some cases it can be useful.
///
/// Example:
///
/// ```rust
/// # use keydb::ToKeydbArgs;
/// let mut args = vec![];
/// args.extend("SET".to_keydb_args());
/// args.extend("my_key".to_keydb_args());
/// args.extend(42.to_keydb_args());
/// let cmd = keydb::pack_command(&args);
/// assert_eq!(cmd, b"*3\r\n$3\r\nSET\r\n$6\r\nmy_key\r\n$2\r\n42\r\n".to_vec());
/// ```
pub fn pack_command(args: &[Vec<u8>]) -> Vec<u8> {
    encode_command(args.iter().map(|x| &x[..]))
}

/// Shortcut for creating a new pipeline.
pub fn pipe() -> Pipeline {
    Pipeline::new()
}

#[cfg(test)]
mod tests {
    use super::{cmd, Cmd};
    use crate::parser::parse_keydb_value;
    use crate::types::Value;

    #[test]
    fn packs_bit_exact_multi_bulk() {
        let c = cmd("SET").arg("my_key").arg(42).clone();
        assert_eq!(
            c.get_packed_command(),
            b"*3\r\n$3\r\nSET\r\n$6\r\nmy_key\r\n$2\r\n42\r\n".to_vec()
        );
    }

    #[test]
    fn packs_binary_safe_arguments() {
        let c = cmd("SET").arg("key").arg(&b"a\r\nb\0c"[..]).clone();
        assert_eq!(
            c.get_packed_command(),
            b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$6\r\na\r\nb\0c\r\n".to_vec()
        );
    }

    #[test]
    fn encoded_request_decodes_back_to_the_same_arguments() {
        let c = cmd("EXPIREMEMBER").arg("k").arg("sub").arg(30).arg("ms").clone();
        let packed = c.get_packed_command();

        // a request frame is itself a valid multi-bulk reply
        let decoded = parse_keydb_value(&packed).unwrap();
        let expected: Vec<Value> = c
            .args_iter()
            .map(|arg| Value::BulkString(arg.to_vec()))
            .collect();
        assert_eq!(decoded, Value::Array(expected));
    }

    #[test]
    fn empty_command_is_flagged() {
        assert!(Cmd::new().is_empty());
        assert!(!cmd("PING").is_empty());
    }
}

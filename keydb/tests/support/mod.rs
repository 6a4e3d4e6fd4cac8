#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use keydb::{Parser, Value};

/// A minimal in-process server speaking enough RESP for the integration
/// tests: strings, a transaction queue, and a `HANG` command that goes
/// silent to provoke client read timeouts.
pub struct TestServer {
    port: u16,
    accepted: Arc<AtomicUsize>,
}

type Store = Arc<Mutex<HashMap<String, Vec<u8>>>>;

impl TestServer {
    pub fn new() -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let port = listener.local_addr().expect("local addr").port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let store: Store = Arc::new(Mutex::new(HashMap::new()));

        {
            let accepted = accepted.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(_) => break,
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let store = store.clone();
                    thread::spawn(move || serve_connection(stream, store));
                }
            });
        }

        TestServer { port, accepted }
    }

    pub fn url(&self) -> String {
        format!("keydb://127.0.0.1:{}", self.port)
    }

    pub fn connection_info(&self) -> keydb::ConnectionInfo {
        keydb::ConnectionInfo {
            addr: keydb::ConnectionAddr::Tcp("127.0.0.1".to_string(), self.port),
            db: 0,
            username: None,
            password: None,
        }
    }

    /// Number of TCP connections the server has accepted so far.
    pub fn connection_count(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

fn serve_connection(mut stream: TcpStream, store: Store) {
    let mut parser = Parser::new();
    let mut in_transaction = false;
    let mut transaction_aborted = false;
    let mut queued: Vec<Vec<Vec<u8>>> = Vec::new();

    loop {
        let request = match parser.parse_value(&mut stream) {
            Ok(value) => value,
            Err(_) => return,
        };
        let args = match request_args(request) {
            Some(args) if !args.is_empty() => args,
            _ => {
                let _ = stream.write_all(b"-ERR Protocol error\r\n");
                return;
            }
        };
        let name = String::from_utf8_lossy(&args[0]).to_uppercase();

        let reply: Vec<u8> = if in_transaction {
            match name.as_str() {
                "EXEC" => {
                    let reply = if transaction_aborted {
                        b"-EXECABORT Transaction discarded because of previous errors.\r\n"
                            .to_vec()
                    } else {
                        let mut body = Vec::new();
                        for queued_args in &queued {
                            body.extend_from_slice(&apply_command(queued_args, &store));
                        }
                        let mut reply = format!("*{}\r\n", queued.len()).into_bytes();
                        reply.extend_from_slice(&body);
                        reply
                    };
                    in_transaction = false;
                    transaction_aborted = false;
                    queued.clear();
                    reply
                }
                "DISCARD" => {
                    in_transaction = false;
                    transaction_aborted = false;
                    queued.clear();
                    b"+OK\r\n".to_vec()
                }
                _ if is_known_command(&name) => {
                    queued.push(args);
                    b"+QUEUED\r\n".to_vec()
                }
                _ => {
                    transaction_aborted = true;
                    format!("-ERR unknown command '{name}'\r\n").into_bytes()
                }
            }
        } else {
            match name.as_str() {
                "MULTI" => {
                    in_transaction = true;
                    transaction_aborted = false;
                    b"+OK\r\n".to_vec()
                }
                "HANG" => {
                    // go silent long enough for any client read timeout to fire
                    thread::sleep(Duration::from_secs(5));
                    b"+OK\r\n".to_vec()
                }
                _ => apply_command(&args, &store),
            }
        };

        if stream.write_all(&reply).is_err() {
            return;
        }
    }
}

fn is_known_command(name: &str) -> bool {
    matches!(name, "PING" | "SET" | "GET" | "DEL" | "EXISTS")
}

fn apply_command(args: &[Vec<u8>], store: &Store) -> Vec<u8> {
    let name = String::from_utf8_lossy(&args[0]).to_uppercase();
    match (name.as_str(), args.len()) {
        ("PING", 1) => b"+PONG\r\n".to_vec(),
        ("SET", 3) => {
            let key = String::from_utf8_lossy(&args[1]).to_string();
            store.lock().unwrap().insert(key, args[2].clone());
            b"+OK\r\n".to_vec()
        }
        ("GET", 2) => {
            let key = String::from_utf8_lossy(&args[1]).to_string();
            match store.lock().unwrap().get(&key) {
                Some(value) => {
                    let mut reply = format!("${}\r\n", value.len()).into_bytes();
                    reply.extend_from_slice(value);
                    reply.extend_from_slice(b"\r\n");
                    reply
                }
                None => b"$-1\r\n".to_vec(),
            }
        }
        ("DEL", 2) => {
            let key = String::from_utf8_lossy(&args[1]).to_string();
            let removed = store.lock().unwrap().remove(&key).is_some();
            format!(":{}\r\n", removed as i64).into_bytes()
        }
        ("EXISTS", 2) => {
            let key = String::from_utf8_lossy(&args[1]).to_string();
            let exists = store.lock().unwrap().contains_key(&key);
            format!(":{}\r\n", exists as i64).into_bytes()
        }
        (name, _) if is_known_command(name) => {
            format!("-ERR wrong number of arguments for '{name}' command\r\n").into_bytes()
        }
        (name, _) => format!("-ERR unknown command '{name}'\r\n").into_bytes(),
    }
}

fn request_args(request: Value) -> Option<Vec<Vec<u8>>> {
    match request {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::BulkString(bytes) => Some(bytes),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

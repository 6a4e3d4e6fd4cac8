use keydb::{Commands, Nested};

/// Demonstrates the basic command surface, a transaction and the
/// KeyDB-specific commands against a server on the default port.
fn main() -> keydb::KeydbResult<()> {
    let client = keydb::Client::open("keydb://127.0.0.1/")?;
    let mut con = client.get_connection()?;

    let _: () = con.set("my_key", 42)?;
    let answer: i64 = con.get("my_key")?;
    println!("my_key = {answer}");

    // members of a set can carry their own expiration on KeyDB
    let _: i64 = con.sadd("fruits", &["orange", "apple"])?;
    con.expiremember("fruits", "orange", 30)?;

    // an atomic batch
    let mut pipe = client.pipeline();
    pipe.cmd("SET").arg("key_1").arg(1).ignore();
    pipe.cmd("SET").arg("key_2").arg(2).ignore();
    pipe.cmd("GET").arg("key_1");
    let replies = pipe.execute(&mut con)?;
    println!("transaction replies: {replies:?}");

    // hierarchical hashes are addressed by dotted paths
    let profile = Nested::node()
        .with("name", "ada")
        .with("stats", Nested::node().with("visits", 1));
    con.nhset("user:1", &profile)?;
    let name = con.nhget("user:1.name")?;
    println!("user:1.name = {name:?}");

    Ok(())
}

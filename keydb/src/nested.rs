//! Hierarchical hash values.
//!
//! KeyDB's hierarchical hashes are addressed by dot-separated paths
//! (`user.profile.name`).  Writes take either a nested mapping or a flat
//! list of `(path, value)` pairs; both forms are flattened into the same
//! ordered sequence of leaf writes before anything goes onto the wire.

use crate::types::{ErrorKind, KeydbResult, ToKeydbArgs};

/// A node in a hierarchical hash value.
///
/// Inner nodes keep their fields in insertion order, so flattening a
/// value is deterministic: leaves are enumerated depth first, preserving
/// the per-level order in which fields were added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nested {
    /// A single binary-safe value.
    Leaf(Vec<u8>),
    /// An ordered mapping from field names to child nodes.
    Node(Vec<(String, Nested)>),
}

impl Nested {
    /// Creates an empty inner node.
    pub fn node() -> Nested {
        Nested::Node(Vec::new())
    }

    /// Creates a leaf from any value that encodes to exactly one command
    /// argument.  Values that encode to zero or several arguments (like
    /// vectors) fail with `ErrorKind::EncodingError`.
    pub fn leaf<V: ToKeydbArgs>(value: V) -> KeydbResult<Nested> {
        let mut args = value.to_keydb_args();
        if args.len() != 1 {
            fail!((
                ErrorKind::EncodingError,
                "A hierarchical hash leaf must encode to exactly one argument"
            ));
        }
        Ok(Nested::Leaf(args.pop().unwrap()))
    }

    /// Sets a field on an inner node, preserving insertion order.  Setting
    /// an existing field replaces its value in place.  Calling this on a
    /// leaf replaces the leaf with a node holding only the new field.
    pub fn set<V: Into<Nested>>(&mut self, field: &str, value: V) -> &mut Nested {
        if let Nested::Leaf(_) = self {
            *self = Nested::node();
        }
        if let Nested::Node(fields) = self {
            match fields.iter_mut().find(|(name, _)| name == field) {
                Some((_, slot)) => *slot = value.into(),
                None => fields.push((field.to_string(), value.into())),
            }
        }
        self
    }

    /// Builder-style variant of [`set`](Nested::set).
    pub fn with<V: Into<Nested>>(mut self, field: &str, value: V) -> Nested {
        self.set(field, value);
        self
    }

    /// Returns true if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Nested::Leaf(_))
    }

    /// Enumerates every leaf below this node together with its full
    /// dotted path starting at `root`.
    ///
    /// The enumeration is depth first and preserves per-level insertion
    /// order, so the same value always produces the same ordered list of
    /// writes.
    pub fn flatten(&self, root: &str) -> Vec<(String, Vec<u8>)> {
        let mut leaves = Vec::new();
        collect_leaves(root, self, &mut leaves);
        leaves
    }
}

fn collect_leaves(path: &str, node: &Nested, out: &mut Vec<(String, Vec<u8>)>) {
    match node {
        Nested::Leaf(value) => out.push((path.to_string(), value.clone())),
        Nested::Node(fields) => {
            for (field, child) in fields {
                collect_leaves(&format!("{path}.{field}"), child, out);
            }
        }
    }
}

impl From<&str> for Nested {
    fn from(value: &str) -> Nested {
        Nested::Leaf(value.as_bytes().to_vec())
    }
}

impl From<String> for Nested {
    fn from(value: String) -> Nested {
        Nested::Leaf(value.into_bytes())
    }
}

impl From<Vec<u8>> for Nested {
    fn from(value: Vec<u8>) -> Nested {
        Nested::Leaf(value)
    }
}

impl From<&[u8]> for Nested {
    fn from(value: &[u8]) -> Nested {
        Nested::Leaf(value.to_vec())
    }
}

macro_rules! nested_from_int {
    ($t:ty) => {
        impl From<$t> for Nested {
            fn from(value: $t) -> Nested {
                let mut buf = ::itoa::Buffer::new();
                Nested::Leaf(buf.format(value).as_bytes().to_vec())
            }
        }
    };
}

nested_from_int!(i32);
nested_from_int!(i64);
nested_from_int!(u32);
nested_from_int!(u64);
nested_from_int!(usize);

impl From<f64> for Nested {
    fn from(value: f64) -> Nested {
        let mut buf = ::ryu::Buffer::new();
        Nested::Leaf(buf.format(value).as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_enumerates_leaves_in_insertion_order() {
        let value = Nested::node().with("x", Nested::node().with("y", 1).with("z", 2));
        assert_eq!(
            value.flatten("r"),
            vec![
                ("r.x.y".to_string(), b"1".to_vec()),
                ("r.x.z".to_string(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn flatten_is_depth_first_across_siblings() {
        let value = Nested::node()
            .with("a", Nested::node().with("b", "1"))
            .with("c", "2")
            .with("d", Nested::node().with("e", Nested::node().with("f", "3")));
        let paths: Vec<String> = value.flatten("root").into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["root.a.b", "root.c", "root.d.e.f"]);
    }

    #[test]
    fn setting_an_existing_field_keeps_its_position() {
        let mut value = Nested::node();
        value.set("a", "1").set("b", "2").set("a", "3");
        assert_eq!(
            value.flatten("r"),
            vec![
                ("r.a".to_string(), b"3".to_vec()),
                ("r.b".to_string(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn flatten_of_a_bare_leaf_is_the_root_itself() {
        let value = Nested::from("42");
        assert_eq!(value.flatten("r"), vec![("r".to_string(), b"42".to_vec())]);
    }

    #[test]
    fn leaf_rejects_multi_argument_values() {
        let err = Nested::leaf(vec!["a", "b"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn leaf_accepts_single_argument_values() {
        assert_eq!(Nested::leaf(7).unwrap(), Nested::Leaf(b"7".to_vec()));
        assert_eq!(
            Nested::leaf("hello").unwrap(),
            Nested::Leaf(b"hello".to_vec())
        );
    }
}

//! Canonical string encoding of claim field values.
//!
//! Every signed field is reduced to one string before signing, and the
//! verifier rebuilds the same string from the current claim. The encoding
//! never sorts, never depends on locale, and never touches floats.

use crate::claim::Signer;

pub trait Canonicalize {
    fn canonicalize(&self) -> String;
}

impl Canonicalize for str {
    fn canonicalize(&self) -> String {
        self.to_string()
    }
}

impl Canonicalize for String {
    fn canonicalize(&self) -> String {
        self.clone()
    }
}

impl Canonicalize for u32 {
    fn canonicalize(&self) -> String {
        self.to_string()
    }
}

impl Canonicalize for bool {
    fn canonicalize(&self) -> String {
        self.to_string()
    }
}

/// Elements joined by a single space, in the order given.
impl Canonicalize for [String] {
    fn canonicalize(&self) -> String {
        self.join(" ")
    }
}

impl Canonicalize for Vec<String> {
    fn canonicalize(&self) -> String {
        self.as_slice().canonicalize()
    }
}

/// Compact JSON array in roster order; each object lists `role`, `name`,
/// `key`, `required` in that order.
impl Canonicalize for [Signer] {
    fn canonicalize(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        // Strings and bools only: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Canonicalize for Vec<Signer> {
    fn canonicalize(&self) -> String {
        self.as_slice().canonicalize()
    }
}

impl<T: Canonicalize> Canonicalize for Option<T> {
    fn canonicalize(&self) -> String {
        match self {
            Some(v) => v.canonicalize(),
            None => String::new(),
        }
    }
}

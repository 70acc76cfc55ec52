//! Pi-hole v6 adapter.
//!
//! Reads the query log for the watch engine and blocks clients by putting
//! them in a per-client group that a set of regex deny rules is bound to.

mod client;
mod models;

pub use client::PiholeClient;

/// Name of the group that carries a client's block
pub fn group_name(client: &str) -> String {
    format!("ParentalControl-{}", client)
}

/// Translate a domain glob into an anchored regex.
///
/// `*` matches any run of characters and `?` a single one; everything else
/// is matched literally.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut literal = String::new();

    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                regex.push_str(&regex::escape(&literal));
                literal.clear();
                regex.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }

    regex.push_str(&regex::escape(&literal));
    regex.push('$');
    regex
}

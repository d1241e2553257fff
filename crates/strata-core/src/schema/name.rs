use sha2::{Digest, Sha256};

/// Longest generated name. PostgreSQL truncates identifiers at 63 bytes,
/// and two long names sharing a prefix would collide after truncation.
const MAX_GENERATED: usize = 63;

/// Characters of the original name kept when shortening.
const KEEP: usize = 54;

pub fn index_name(table: &str, column: &str) -> String {
    generated("idx", table, column)
}

pub fn unique_name(table: &str, column: &str) -> String {
    generated("uq", table, column)
}

pub fn foreign_key_name(table: &str, column: &str) -> String {
    generated("fk", table, column)
}

pub fn check_name(table: &str, column: &str) -> String {
    generated("ck", table, column)
}

fn generated(prefix: &str, table: &str, column: &str) -> String {
    let name = format!("{prefix}_{table}_{column}");

    if name.len() <= MAX_GENERATED {
        return name;
    }

    let digest = Sha256::digest(name.as_bytes());
    let mut short: String = name.chars().take(KEEP).collect();
    short.push('_');
    for byte in &digest[..4] {
        short.push_str(&format!("{byte:02x}"));
    }
    short
}

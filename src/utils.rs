// src/utils.rs
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub enum MasterError {
    MalformedFrame,
    Evaluator(String),
    Encoding(String),
    Database(String),
    PeerDisconnected,
}

impl fmt::Display for MasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame => write!(f, "Malformed request frame"),
            Self::Evaluator(filter) => write!(f, "Filter rejected by evaluator: {}", filter),
            Self::Encoding(e) => write!(f, "Failed to encode server list: {}", e),
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::PeerDisconnected => write!(f, "Peer disconnected"),
        }
    }
}

impl std::error::Error for MasterError {}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// Truncate on a char boundary so multi-byte hostnames survive.
pub fn truncate_name(name: &str, max_chars: usize) -> &str {
    match name.char_indices().nth(max_chars) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_name_short_input_untouched() {
        assert_eq!(truncate_name("alpha", 100), "alpha");
    }

    #[test]
    fn truncate_name_cuts_at_limit() {
        let long = "x".repeat(150);
        assert_eq!(truncate_name(&long, 100).len(), 100);
    }

    #[test]
    fn truncate_name_respects_char_boundaries() {
        let name = "ü".repeat(120);
        let cut = truncate_name(&name, 100);
        assert_eq!(cut.chars().count(), 100);
    }

    #[test]
    fn errors_render_offending_input() {
        let err = MasterError::Evaluator("bogus = 5".to_string());
        assert!(err.to_string().contains("bogus = 5"));
    }
}

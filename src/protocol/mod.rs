// src/protocol/mod.rs
pub mod enctypex;
pub mod list;

// Title tag the client sends in every request frame.
pub const GAME_NAME: &str = "battlefield2";

// Per-title handoff key for the enctypex schedule.
pub const GAME_KEY: &[u8] = b"hW6m9a";

// Request frames are separated by four NUL bytes.
pub const FRAME_DELIMITER: [u8; 4] = [0, 0, 0, 0];

// Advertised in the response header regardless of the listener's real port.
pub const DEFAULT_QUERY_PORT: u16 = 0x1964;

// The validate nonce is always the first eight bytes after the title tag.
pub const VALIDATE_LEN: usize = 8;

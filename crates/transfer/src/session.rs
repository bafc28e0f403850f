//! Per-upload correlation token.

use rand::Rng;

/// Random bytes per session ID (16 hex characters).
const SESSION_ID_BYTES: usize = 8;

/// Generates a CSPRNG session ID as an upper-case hex string.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_length() {
        assert_eq!(generate_session_id().len(), 16);
    }

    #[test]
    fn session_id_is_upper_hex() {
        let id = generate_session_id();
        assert!(
            id.chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
    }
}

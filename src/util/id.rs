//! ID utilities (room tokens).

use rand::Rng;

const TOKEN_LEN: usize = 4;

/// Generate a short uppercase room token, e.g. "KQZP". Collisions are
/// checked against the registry by the caller before use.
pub fn new_room_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_four_uppercase_letters() {
        for _ in 0..100 {
            let token = new_room_token();
            assert_eq!(token.len(), TOKEN_LEN);
            assert!(token.chars().all(|c| c.is_ascii_uppercase()));
        }
    }
}

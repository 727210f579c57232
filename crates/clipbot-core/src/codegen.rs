use rand::Rng;

/// Alphabet for retrieval codes. Excludes visually ambiguous characters
/// (`0/O`, `1/I/L`) so codes survive being read aloud or retyped from a
/// screenshot.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

const CODE_PREFIX: &str = "CLIP";
const CODE_RANDOM_LEN: usize = 6;

/// Generate a retrieval code of the shape `CLIP-XXXXXX`.
///
/// The generator makes no uniqueness promise; the store collision-checks
/// against its live set before accepting a code. With a 31-character
/// alphabet and 6 positions a collision is close to impossible, but the
/// store stays the authority.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(CODE_PREFIX.len() + 1 + CODE_RANDOM_LEN);
    code.push_str(CODE_PREFIX);
    code.push('-');
    for _ in 0..CODE_RANDOM_LEN {
        let idx = rng.random_range(0..CODE_ALPHABET.len());
        code.push(CODE_ALPHABET[idx] as char);
    }
    code
}

/// Quick shape check used by the command layer before hitting the store.
pub fn looks_like_code(s: &str) -> bool {
    let Some(rest) = s.strip_prefix(CODE_PREFIX) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('-') else {
        return false;
    };
    rest.len() == CODE_RANDOM_LEN && rest.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_expected_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(looks_like_code(&code), "bad code: {code}");
        }
    }

    #[test]
    fn alphabet_has_no_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'I', b'L'] {
            assert!(!CODE_ALPHABET.contains(&c));
        }
    }

    #[test]
    fn looks_like_code_rejects_wrong_shapes() {
        assert!(!looks_like_code("CLIP-ABC"));
        assert!(!looks_like_code("clip-ABCDEF"));
        assert!(!looks_like_code("CLIPABCDEF"));
        assert!(!looks_like_code("CLIP-ABC0EF")); // ambiguous char
        assert!(!looks_like_code(""));
    }
}

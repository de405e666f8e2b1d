//! Short code generation
//!
//! Codes are the base-62 digits of a sequence number, most significant first,
//! with `a` as the zero digit. A leading zero never appears except for `n = 0`,
//! so distinct sequence numbers always yield distinct codes.

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Map a sequence number to its display code.
pub fn generate(n: u64) -> String {
    if n == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let base = ALPHABET.len() as u64;
    // u64::MAX needs 11 base-62 digits
    let mut buf = [0u8; 11];
    let mut i = buf.len();
    let mut rest = n;
    while rest > 0 {
        i -= 1;
        buf[i] = ALPHABET[(rest % base) as usize];
        rest /= base;
    }

    // ALPHABET is pure ASCII
    buf[i..].iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_codes() {
        assert_eq!(generate(0), "a");
        assert_eq!(generate(1), "b");
        assert_eq!(generate(25), "z");
        assert_eq!(generate(26), "A");
        assert_eq!(generate(61), "9");
        assert_eq!(generate(62), "ba");
        assert_eq!(generate(62 * 62), "baa");
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes: HashSet<String> = (0..20_000).map(generate).collect();
        assert_eq!(codes.len(), 20_000);
    }

    #[test]
    fn test_length_never_shrinks() {
        let mut last = 0;
        for n in 0..10_000 {
            let len = generate(n).len();
            assert!(len >= last);
            last = len;
        }
    }

    #[test]
    fn test_max_value() {
        let code = generate(u64::MAX);
        assert_eq!(code.len(), 11);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

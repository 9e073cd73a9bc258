//! ASCII-coercion of child output.
//!
//! The engine never fails on undecodable bytes: anything that isn't valid
//! UTF-8 or isn't ASCII is replaced rather than rejected, so capture never
//! aborts a run because a child wrote a stray high byte.

/// Coerce raw child-process bytes into ASCII-safe text.
///
/// Idempotent on clean ASCII text: applying it twice to already-ASCII input
/// is a no-op.
pub fn ensure_ascii_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref())
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_on_clean_ascii() {
        let s = "hello world\n";
        assert_eq!(ensure_ascii_string(s.as_bytes()), s);
        assert_eq!(ensure_ascii_string(ensure_ascii_string(s.as_bytes())), s);
    }

    #[test]
    fn replaces_non_ascii_unicode() {
        assert_eq!(ensure_ascii_string("héllo".as_bytes()), "h?llo");
    }

    #[test]
    fn replaces_invalid_utf8() {
        let bytes = vec![b'a', 0xff, b'b'];
        let out = ensure_ascii_string(&bytes);
        assert!(out.starts_with('a'));
        assert!(out.ends_with('b'));
        assert!(out.is_ascii());
    }

    #[test]
    fn handles_empty_input() {
        assert_eq!(ensure_ascii_string(Vec::<u8>::new()), "");
    }
}

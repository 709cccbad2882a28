use encoding_rs::Encoding;
use lazy_static::lazy_static;
use std::env;

lazy_static! {
    /// Second choice for remote output that is not valid UTF-8, taken from
    /// `SITEWATCH_REMOTE_ENCODING` (any WHATWG label, e.g. "gbk", "latin1").
    static ref FALLBACK_ENCODING: Option<&'static Encoding> = env::var("SITEWATCH_REMOTE_ENCODING")
        .ok()
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()));
}

pub fn decode_output(bytes: &[u8]) -> String {
    decode_with(bytes, *FALLBACK_ENCODING)
}

fn decode_with(bytes: &[u8], fallback: Option<&'static Encoding>) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    if let Some(encoding) = fallback.filter(|e| *e != encoding_rs::UTF_8) {
        let (cow, _encoding_used, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return cow.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(decode_with("ok ✅\n".as_bytes(), None), "ok ✅\n");
    }

    #[test]
    fn test_fallback_encoding_is_used() {
        // "中" in GBK
        let bytes = [0xD6, 0xD0];
        assert_eq!(decode_with(&bytes, Some(encoding_rs::GBK)), "中");
    }

    #[test]
    fn test_lossy_when_nothing_matches() {
        let bytes = [b'a', 0xFF, b'b'];
        assert_eq!(decode_with(&bytes, None), "a\u{FFFD}b");
    }
}

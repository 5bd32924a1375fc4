//! Incremental UTF-8 decoding for chunked byte streams.

/// Decodes UTF-8 across chunk boundaries.
///
/// A multi-byte sequence split between two chunks is carried over and
/// completed by the next chunk. Invalid sequences become U+FFFD, so feeding a
/// stream in any chunking yields the same text as
/// [`String::from_utf8_lossy`] over the whole stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with no carried bytes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, appending complete characters to `out`.
    pub fn decode(&mut self, chunk: &[u8], out: &mut String) {
        if self.pending.is_empty() {
            let carry = decode_into(chunk, out);
            self.pending.extend_from_slice(carry);
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            let carry = decode_into(&joined, out);
            self.pending = carry.to_vec();
        }
    }

    /// Flush any incomplete trailing sequence as U+FFFD.
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

/// Decode as much of `bytes` as possible; returns the incomplete tail.
fn decode_into<'b>(mut bytes: &'b [u8], out: &mut String) -> &'b [u8] {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return &[];
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                match err.error_len() {
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        bytes = &rest[bad..];
                    }
                    None => return rest,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_chunks(chunks: &[&[u8]]) -> String {
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for chunk in chunks {
            decoder.decode(chunk, &mut out);
        }
        decoder.finish(&mut out);
        out
    }

    #[test]
    fn test_split_multibyte_character() {
        let bytes = "身份证".as_bytes();
        assert_eq!(decode_chunks(&[&bytes[..1], &bytes[1..4], &bytes[4..]]), "身份证");
        assert_eq!(decode_chunks(&[&bytes[..8], &bytes[8..]]), "身份证");
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        assert_eq!(decode_chunks(&[b"ab\xffcd"]), "ab\u{FFFD}cd");
        assert_eq!(decode_chunks(&[b"ab\xe8", b"\xba"]), "ab\u{FFFD}");
    }

    #[test]
    fn test_matches_lossy_decode() {
        let bytes: &[u8] = b"x\xe8\xba\xab\xc0y\xe4\xbd";
        let whole = String::from_utf8_lossy(bytes).into_owned();
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_chunks(&[a, b]), whole, "split at {split}");
        }
    }
}

//! `format=flowed` soft-wrap reassembly (RFC 3676).

/// Incremental decoder for `format=flowed` plain text.
///
/// A line ending in a space is joined with the next line without a newline;
/// with `delsp=yes` that trailing space is removed before joining. The
/// signature separator `-- ` is never treated as flowed. Space stuffing (a
/// single leading space on a physical line) is removed. Buffers at most one
/// logical paragraph plus one partial physical line.
#[derive(Debug)]
pub struct FlowedDecoder {
    delsp: bool,
    /// Physical line being assembled from input chunks.
    line: Vec<u8>,
    /// Current logical (unwrapped) line.
    pending: Vec<u8>,
    started: bool,
}

impl FlowedDecoder {
    /// Creates a new decoder.
    #[must_use]
    pub fn new(delsp: bool) -> Self {
        Self {
            delsp,
            line: Vec::new(),
            pending: Vec::new(),
            started: false,
        }
    }

    /// Feeds raw text, returning the logical lines completed so far.
    pub fn push(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for &b in input {
            if b == b'\n' {
                if self.line.last() == Some(&b'\r') {
                    self.line.pop();
                }
                let line = std::mem::take(&mut self.line);
                self.handle_line(&line, &mut out);
            } else {
                self.line.push(b);
            }
        }
        out
    }

    /// Flushes the trailing partial line and the pending logical line.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        if !self.line.is_empty() {
            let mut line = std::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.handle_line(&line, &mut out);
        }
        out.extend_from_slice(&self.pending);
        self.pending.clear();
        out
    }

    fn handle_line(&mut self, line: &[u8], out: &mut Vec<u8>) {
        // remove space stuffing
        let line = line.strip_prefix(b" ").unwrap_or(line);

        if !self.started {
            self.pending = line.to_vec();
            self.started = true;
            return;
        }

        let flowed = self.pending.last() == Some(&b' ') && self.pending != b"-- ";
        if flowed {
            if self.delsp {
                self.pending.pop();
            }
            self.pending.extend_from_slice(line);
        } else {
            out.extend_from_slice(&self.pending);
            out.push(b'\n');
            self.pending = line.to_vec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8], delsp: bool) -> Vec<u8> {
        let mut decoder = FlowedDecoder::new(delsp);
        let mut out = decoder.push(input);
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn test_flowed_join() {
        assert_eq!(decode(b"Foo \r\nBar", false), b"Foo Bar");
    }

    #[test]
    fn test_flowed_delsp_join() {
        assert_eq!(decode(b"Foo \r\nBar \r\nBaz", true), b"FooBarBaz");
    }

    #[test]
    fn test_fixed_lines_kept() {
        assert_eq!(decode(b"Foo\r\nBar", false), b"Foo\nBar");
    }

    #[test]
    fn test_signature_separator_not_joined() {
        assert_eq!(decode(b"-- \r\nAndris", false), b"-- \nAndris");
    }

    #[test]
    fn test_space_stuffing_removed() {
        assert_eq!(decode(b" From here\r\n  indented", false), b"From here\n indented");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = FlowedDecoder::new(true);
        let mut out = Vec::new();
        for b in b"Foo \r\nBar \r\nBaz" {
            out.extend(decoder.push(&[*b]));
        }
        out.extend(decoder.finish());
        assert_eq!(out, b"FooBarBaz");
    }

    #[test]
    fn test_paragraph_boundary() {
        assert_eq!(
            decode(b"one \r\ntwo\r\n\r\nthree", false),
            b"one two\n\nthree"
        );
    }
}

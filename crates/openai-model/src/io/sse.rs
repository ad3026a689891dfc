use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading the `data` of server-sent events from a chunk stream.
pub struct Sse {
    buf: String,
    // Raw bytes that don't form a complete UTF-8 sequence yet.
    pending_bytes: Vec<u8>,
    // A chunk ended with `\r`, which may be the first half of `\r\n`.
    pending_cr: bool,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending_bytes: Vec::new(),
            pending_cr: false,
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events already buffered before reading more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                if std::mem::take(&mut self.pending_cr) {
                    self.buf.push('\n');
                    continue;
                }
                // Abort if no more data available. A trailing partial
                // event without the blank line is dropped.
                return Ok(None);
            };
            self.push_bytes(&bytes)?;
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending_bytes.extend_from_slice(bytes);
        let valid_len = match str::from_utf8(&self.pending_bytes) {
            Ok(s) => s.len(),
            // A multi-byte character may be split across chunks.
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        let rest = self.pending_bytes.split_off(valid_len);
        let valid = std::mem::replace(&mut self.pending_bytes, rest);
        // Validated above.
        let s = String::from_utf8(valid).map_err(|_| Error::InvalidPayload)?;
        let mut text = String::with_capacity(s.len() + 1);
        if std::mem::take(&mut self.pending_cr) {
            text.push('\r');
        }
        text.push_str(&s);
        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }
        // Only line feeds are treated as line terminators below.
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.buf.push_str(&text);
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // event         = *( comment / field ) end-of-line
            // comment       = colon *any-char end-of-line
            // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
            let Some(eol_idx) = self.buf.find("\n\n") else {
                return Ok(None);
            };
            let block: String = self.buf.drain(0..eol_idx + 2).collect();

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match name {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            // Comment-only blocks (keep-alives) carry no event.
            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
    }
}

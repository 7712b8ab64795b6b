// Quote-aware line splitter: turns a stream of byte chunks into logical lines.
// A newline inside double quotes does not end a line, and the quote state and
// unterminated tail of one chunk carry over into the next.

use crate::error::DiffError;
use crate::source::{ByteSource, ChunkReader};
use memchr::memchr2;

/// Exact byte range of one logical line in its source, without the `\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub offset: u64,
    pub length: u32,
}

pub struct LineSplitter {
    // Unterminated bytes carried across chunks, starting at `pending_start`.
    pending: Vec<u8>,
    pending_start: u64,
    in_quotes: bool,
    expect_header: bool,
    header: Option<Vec<u8>>,
}

impl LineSplitter {
    /// Splitter that swallows the first logical line as the header.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            pending_start: 0,
            in_quotes: false,
            expect_header: true,
            header: None,
        }
    }

    /// Splitter that emits every line, including the first.
    pub fn without_header() -> Self {
        Self {
            expect_header: false,
            ..Self::new()
        }
    }

    /// Raw bytes of the header line once it has been seen.
    pub fn header(&self) -> Option<&[u8]> {
        self.header.as_deref()
    }

    // Feed one chunk. `chunk_offset` is the absolute position of `bytes[0]`.
    pub fn push<F>(&mut self, chunk_offset: u64, bytes: &[u8], mut on_line: F) -> Result<(), DiffError>
    where
        F: FnMut(LineSpan, &[u8]) -> Result<(), DiffError>,
    {
        if self.pending.is_empty() {
            self.pending_start = chunk_offset;
        }
        debug_assert_eq!(self.pending_start + self.pending.len() as u64, chunk_offset);

        // Bytes already in `pending` were scanned by the previous push.
        let mut pos = self.pending.len();
        self.pending.extend_from_slice(bytes);

        let mut in_quotes = self.in_quotes;
        let mut line_start = 0usize;
        while let Some(rel) = memchr2(b'"', b'\n', &self.pending[pos..]) {
            let i = pos + rel;
            if self.pending[i] == b'"' {
                in_quotes = !in_quotes;
            } else if !in_quotes {
                let span = span_of(self.pending_start, line_start, i)?;
                deliver(
                    &mut self.expect_header,
                    &mut self.header,
                    span,
                    &self.pending[line_start..i],
                    &mut on_line,
                )?;
                line_start = i + 1;
            }
            pos = i + 1;
        }
        self.in_quotes = in_quotes;

        if line_start > 0 {
            self.pending.drain(..line_start);
            self.pending_start += line_start as u64;
        }
        Ok(())
    }

    // Flush the final line when the source does not end with a newline.
    pub fn finish<F>(&mut self, mut on_line: F) -> Result<(), DiffError>
    where
        F: FnMut(LineSpan, &[u8]) -> Result<(), DiffError>,
    {
        if !self.pending.is_empty() {
            let span = span_of(self.pending_start, 0, self.pending.len())?;
            deliver(
                &mut self.expect_header,
                &mut self.header,
                span,
                &self.pending,
                &mut on_line,
            )?;
            self.pending_start += self.pending.len() as u64;
            self.pending.clear();
        }
        self.in_quotes = false;
        Ok(())
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn span_of(base: u64, start: usize, end: usize) -> Result<LineSpan, DiffError> {
    let offset = base + start as u64;
    let length = u32::try_from(end - start).map_err(|_| DiffError::LineTooLong { offset })?;
    Ok(LineSpan { offset, length })
}

fn deliver<F>(
    expect_header: &mut bool,
    header: &mut Option<Vec<u8>>,
    span: LineSpan,
    line: &[u8],
    on_line: &mut F,
) -> Result<(), DiffError>
where
    F: FnMut(LineSpan, &[u8]) -> Result<(), DiffError>,
{
    if *expect_header {
        *expect_header = false;
        *header = Some(line.to_vec());
        return Ok(());
    }
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(());
    }
    on_line(span, line)
}

/// Receives the output of [`scan_lines`].
pub trait LineVisitor {
    fn on_line(&mut self, span: LineSpan, line: &[u8]) -> Result<(), DiffError>;

    /// Called after every chunk with bytes consumed so far and the source length.
    fn on_chunk(&mut self, _consumed: u64, _total: u64) -> Result<(), DiffError> {
        Ok(())
    }
}

/// Stream a whole source through `splitter`, yielding the thread once per chunk.
pub fn scan_lines<V>(
    source: &dyn ByteSource,
    chunk_size: usize,
    splitter: &mut LineSplitter,
    visitor: &mut V,
) -> Result<(), DiffError>
where
    V: LineVisitor + ?Sized,
{
    let mut reader = ChunkReader::new(source, chunk_size);
    while let Some(chunk) = reader.next_chunk()? {
        splitter.push(chunk.offset, &chunk.bytes, |span, line| visitor.on_line(span, line))?;
        visitor.on_chunk(reader.position(), reader.total_len())?;
        std::thread::yield_now();
    }
    splitter.finish(|span, line| visitor.on_line(span, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{read_range, MemorySource};

    #[derive(Default)]
    struct Collect {
        lines: Vec<(LineSpan, Vec<u8>)>,
        chunks: usize,
    }

    impl LineVisitor for Collect {
        fn on_line(&mut self, span: LineSpan, line: &[u8]) -> Result<(), DiffError> {
            self.lines.push((span, line.to_vec()));
            Ok(())
        }

        fn on_chunk(&mut self, _consumed: u64, _total: u64) -> Result<(), DiffError> {
            self.chunks += 1;
            Ok(())
        }
    }

    fn collect(input: &[u8], chunk_size: usize) -> (Option<Vec<u8>>, Vec<(LineSpan, Vec<u8>)>) {
        let src = MemorySource::new(input.to_vec());
        let mut splitter = LineSplitter::new();
        let mut out = Collect::default();
        scan_lines(&src, chunk_size, &mut splitter, &mut out).unwrap();
        (splitter.header().map(|h| h.to_vec()), out.lines)
    }

    #[test]
    fn header_is_consumed_not_emitted() {
        let (header, lines) = collect(b"id,name\n1,Alice\n2,Bob\n", 1024);
        assert_eq!(header.unwrap(), b"id,name".to_vec());
        let texts: Vec<_> = lines.iter().map(|(_, l)| l.clone()).collect();
        assert_eq!(texts, vec![b"1,Alice".to_vec(), b"2,Bob".to_vec()]);
        assert_eq!(lines[0].0, LineSpan { offset: 8, length: 7 });
        assert_eq!(lines[1].0, LineSpan { offset: 16, length: 5 });
    }

    #[test]
    fn offsets_survive_every_chunk_size() {
        let input = b"id,note\n1,\"multi\nline, quoted\"\n\n2,plain\n3,\"a \"\"q\"\" b\"\n4,tail";
        let (_, reference) = collect(input, input.len());
        assert_eq!(reference.len(), 4);
        for size in 1..=input.len() {
            let (_, lines) = collect(input, size);
            assert_eq!(lines, reference, "chunk size {}", size);
        }
        let src = MemorySource::new(input.to_vec());
        for (span, line) in &reference {
            assert_eq!(&read_range(&src, span.offset, span.length).unwrap(), line);
        }
    }

    #[test]
    fn quoted_newline_is_not_a_boundary() {
        let (_, lines) = collect(b"h\n\"a\nb\",c\nd\n", 3);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].1, b"\"a\nb\",c".to_vec());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (_, lines) = collect(b"h\n\n   \r\nx\n", 2);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0.offset, 8);
    }

    #[test]
    fn without_header_emits_first_line() {
        let src = MemorySource::new(b"a\nb".to_vec());
        let mut splitter = LineSplitter::without_header();
        let mut out = Collect::default();
        scan_lines(&src, 1, &mut splitter, &mut out).unwrap();
        assert_eq!(out.lines.len(), 2);
        assert_eq!(out.chunks, 3);
        assert!(splitter.header().is_none());
    }
}

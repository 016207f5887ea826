//! Recursive text chunking with overlap and character offsets
//!
//! Text is first broken into pieces along the coarsest separator that occurs
//! (paragraphs, then lines, sentences, words, single characters) until every
//! piece fits in `chunk_size - overlap`. Pieces are then packed greedily into
//! segments of at most `chunk_size` characters. Each new segment starts
//! `overlap` characters before the end of the previous one, moved back to a
//! word boundary when one is close, so consecutive segments always share at
//! least `overlap` characters.

use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::types::Segment;

/// How far an overlap start may move back looking for whitespace
const MAX_BOUNDARY_BACKTRACK: usize = 64;

/// Separator hierarchy, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

const SEPARATORS: [Separator; 5] = [
    Separator::Paragraph,
    Separator::Line,
    Separator::Sentence,
    Separator::Word,
    Separator::Character,
];

impl Separator {
    /// Split keeping separators attached, so the parts concatenate back to `text`
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self {
            Separator::Paragraph => text.split_inclusive("\n\n").collect(),
            Separator::Line => text.split_inclusive('\n').collect(),
            Separator::Sentence => text.split_sentence_bounds().collect(),
            Separator::Word => text.split_inclusive(char::is_whitespace).collect(),
            Separator::Character => text
                .char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect(),
        }
    }
}

/// Half-open character range `start..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum segment length in characters
    chunk_size: usize,
    /// Characters shared by consecutive segments
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker. `overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split document text into ordered segments
    pub fn split(&self, document_id: Uuid, text: &str) -> Vec<Segment> {
        self.split_with_pages(document_id, text, &[])
    }

    /// Split document text, tagging each segment with the page it starts on.
    ///
    /// `page_starts` holds `(char_offset, page_number)` for each page, in
    /// ascending offset order.
    pub fn split_with_pages(
        &self,
        document_id: Uuid,
        text: &str,
        page_starts: &[(usize, u32)],
    ) -> Vec<Segment> {
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        self.chunk_spans(text)
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let content = text[bounds[span.start]..bounds[span.end]].to_string();
                let segment =
                    Segment::new(document_id, index as u32, content, span.start, span.end);
                match page_starts.partition_point(|&(offset, _)| offset <= span.start) {
                    0 => segment,
                    i => segment.with_page(page_starts[i - 1].1),
                }
            })
            .collect()
    }

    /// Compute segment spans without materializing text
    pub fn chunk_spans(&self, text: &str) -> Vec<Span> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let piece_limit = self.chunk_size - self.overlap;
        let mut pieces = Vec::new();
        split_recursive(text, 0, 0, piece_limit, &mut pieces);

        let chars: Vec<char> = text.chars().collect();
        self.merge(&chars, &pieces)
    }

    /// Pack contiguous pieces into overlapping spans
    fn merge(&self, chars: &[char], pieces: &[Span]) -> Vec<Span> {
        let mut spans: Vec<Span> = Vec::new();
        let mut start = 0usize;
        let mut end = 0usize;

        for piece in pieces {
            if end > start && piece.end - start > self.chunk_size {
                spans.push(Span { start, end });
                start = self.overlap_start(chars, start, end, piece.len());
            }
            end = piece.end;
        }

        if end > start {
            // A tail of pure whitespace adds nothing retrievable
            let redundant = spans
                .last()
                .map(|prev| chars[prev.end..end].iter().all(|c| c.is_whitespace()))
                .unwrap_or(false);
            if !redundant {
                spans.push(Span { start, end });
            }
        }

        spans
    }

    /// Start of the next span: `overlap` chars back from `end`, moved back to
    /// whitespace if that still leaves room for the next piece.
    fn overlap_start(&self, chars: &[char], start: usize, end: usize, next_len: usize) -> usize {
        if self.overlap == 0 {
            return end;
        }

        let exact = end.saturating_sub(self.overlap).max(start + 1);
        let earliest = end
            .saturating_sub(self.chunk_size - next_len)
            .max(start + 1)
            .max(exact.saturating_sub(MAX_BOUNDARY_BACKTRACK));

        let mut pos = exact;
        while pos > earliest {
            if chars[pos - 1].is_whitespace() {
                return pos;
            }
            pos -= 1;
        }
        exact
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

/// Break `text` (starting at char `offset`) into pieces of at most `limit` chars
fn split_recursive(text: &str, offset: usize, level: usize, limit: usize, out: &mut Vec<Span>) {
    let len = text.chars().count();
    if len <= limit {
        out.push(Span {
            start: offset,
            end: offset + len,
        });
        return;
    }

    for (depth, separator) in SEPARATORS.iter().enumerate().skip(level) {
        let parts = separator.split(text);
        if parts.len() < 2 {
            continue;
        }

        let mut pos = offset;
        for part in parts {
            let part_len = part.chars().count();
            if part_len <= limit {
                out.push(Span {
                    start: pos,
                    end: pos + part_len,
                });
            } else {
                split_recursive(part, pos, depth + 1, limit, out);
            }
            pos += part_len;
        }
        return;
    }

    // Unreachable for limit >= 1: character splitting always yields parts
    out.push(Span {
        start: offset,
        end: offset + len,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text(target_len: usize) -> String {
        let mut text = String::new();
        let mut n = 0;
        while text.chars().count() < target_len {
            text.push_str(&format!(
                "Sentence number {} reports the quarterly figures for the region. ",
                n
            ));
            n += 1;
        }
        text.chars().take(target_len).collect()
    }

    fn shared_chars(prev: &Segment, next: &Segment) -> usize {
        prev.char_end().saturating_sub(next.char_start())
    }

    #[test]
    fn test_short_document_single_segment() {
        let chunker = TextChunker::new(1000, 200);
        let segments = chunker.split(Uuid::new_v4(), "A short note about invoices.");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text(), "A short note about invoices.");
        assert_eq!(segments[0].char_start(), 0);
        assert_eq!(segments[0].sequence_index(), 0);
    }

    #[test]
    fn test_empty_and_whitespace_documents() {
        let chunker = TextChunker::default();
        assert!(chunker.split(Uuid::new_v4(), "").is_empty());
        assert!(chunker.split(Uuid::new_v4(), " \n\n\t ").is_empty());
    }

    #[test]
    fn test_three_thousand_chars_with_overlap() {
        let text = sample_text(3000);
        let chunker = TextChunker::new(1000, 200);
        let segments = chunker.split(Uuid::new_v4(), &text);

        assert!(segments.len() >= 3, "got {} segments", segments.len());
        for seg in &segments {
            assert!(seg.char_len() <= 1000);
            assert_eq!(seg.text().chars().count(), seg.char_len());
        }
        for pair in segments.windows(2) {
            let shared = shared_chars(&pair[0], &pair[1]);
            assert!(shared >= 200, "only {} shared chars", shared);

            let prev: Vec<char> = pair[0].text().chars().collect();
            let next: Vec<char> = pair[1].text().chars().collect();
            assert_eq!(&prev[prev.len() - shared..], &next[..shared]);
        }
        assert_eq!(segments.last().unwrap().char_end(), 3000);
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text(5000);
        let chunker = TextChunker::new(700, 100);
        let id = Uuid::new_v4();
        assert_eq!(chunker.split(id, &text), chunker.split(id, &text));
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(300);
        let para_b = "b".repeat(300);
        let para_c = "c".repeat(300);
        let text = format!("{}\n\n{}\n\n{}", para_a, para_b, para_c);

        let chunker = TextChunker::new(650, 0);
        let segments = chunker.split(Uuid::new_v4(), &text);

        assert_eq!(segments.len(), 2);
        assert!(segments[0].text().ends_with("\n\n"));
        assert!(segments[1].text().starts_with('c'));
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(2500);
        let chunker = TextChunker::new(1000, 200);
        let segments = chunker.split(Uuid::new_v4(), &text);

        assert!(segments.len() >= 3);
        for pair in segments.windows(2) {
            assert_eq!(shared_chars(&pair[0], &pair[1]), 200);
        }
    }

    #[test]
    fn test_offsets_are_characters_not_bytes() {
        let text = "Ünïcödé text — with dashes. ".repeat(80);
        let chunker = TextChunker::new(300, 50);
        let segments = chunker.split(Uuid::new_v4(), &text);
        let chars: Vec<char> = text.chars().collect();

        for seg in &segments {
            let expected: String = chars[seg.char_start()..seg.char_end()].iter().collect();
            assert_eq!(seg.text(), expected);
        }
    }

    #[test]
    fn test_page_tagging() {
        let page_one = "First page text. ".repeat(10);
        let page_two = "Second page text. ".repeat(10);
        let text = format!("{}{}", page_one, page_two);
        // Page 2 was blank and skipped during extraction
        let offsets = [(0, 1), (page_one.chars().count(), 3)];

        let chunker = TextChunker::new(100, 20);
        let segments = chunker.split_with_pages(Uuid::new_v4(), &text, &offsets);

        assert_eq!(segments.first().unwrap().page_number(), Some(1));
        assert_eq!(segments.last().unwrap().page_number(), Some(3));
    }

    #[test]
    fn test_trailing_whitespace_tail_dropped() {
        let text = format!("{}{}", "word ".repeat(60), " ".repeat(150));
        let chunker = TextChunker::new(200, 40);
        let segments = chunker.split(Uuid::new_v4(), &text);
        let last = segments.last().unwrap();
        assert!(!last.text().trim().is_empty());
    }
}

//! Byte-budgeted splitting of outbound text.
//!
//! The chat platform rejects messages above a fixed UTF-8 byte size, so long
//! assistant replies are cut into several messages before sending. Splitting
//! prefers line boundaries; a single line that is too long on its own is
//! "hard-split" on character boundaries. No character is ever cut in half,
//! and the pieces put back together with [`reassemble`] reproduce the input
//! byte-for-byte.
//!
//! A character whose encoding alone exceeds the budget cannot be split
//! further. It is emitted as its own chunk, which is then larger than
//! `max_bytes`; callers must tolerate that.

/// One piece of a split message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in the output sequence (0-based).
    pub index: usize,
    /// The chunk content. Always valid UTF-8.
    pub text: String,
    /// Whether a newline from the input was consumed as the split point
    /// directly before this chunk.
    pub after_newline: bool,
}

impl TextChunk {
    /// UTF-8 length of the chunk content.
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }
}

/// Split `text` into chunks of at most `max_bytes` UTF-8 bytes.
///
/// Text already within budget comes back unchanged as a single chunk, so
/// `split_message("", n)` is `[""]`.
pub fn split_message(text: &str, max_bytes: usize) -> Vec<String> {
    split_chunks(text, max_bytes)
        .into_iter()
        .map(|c| c.text)
        .collect()
}

/// Like [`split_message`], but keeps the split-point bookkeeping needed to
/// reconstruct the input.
pub fn split_chunks(text: &str, max_bytes: usize) -> Vec<TextChunk> {
    let mut out = ChunkSink::default();

    if text.len() <= max_bytes {
        out.emit(text.to_string(), false);
        return out.chunks;
    }

    let mut current: Option<Pending> = None;

    for (i, line) in text.split('\n').enumerate() {
        match current.take() {
            Some(mut pending) if pending.text.len() + 1 + line.len() <= max_bytes => {
                pending.text.push('\n');
                pending.text.push_str(line);
                current = Some(pending);
            }
            Some(pending) => {
                out.emit(pending.text, pending.after_newline);
                current = Some(out.open_line(line, true, max_bytes));
            }
            None => {
                current = Some(out.open_line(line, i > 0, max_bytes));
            }
        }
    }

    if let Some(pending) = current {
        out.emit(pending.text, pending.after_newline);
    }
    out.chunks
}

/// Split a single line on character boundaries into pieces of at most
/// `max_bytes` bytes.
///
/// An empty line yields no pieces. A character wider than `max_bytes` is
/// returned alone in its own piece.
pub fn hard_split_line(line: &str, max_bytes: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > max_bytes {
            parts.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Rebuild the original text from the output of [`split_chunks`].
pub fn reassemble(chunks: &[TextChunk]) -> String {
    let capacity = chunks.iter().map(|c| c.byte_len() + 1).sum();
    let mut text = String::with_capacity(capacity);
    for chunk in chunks {
        if chunk.after_newline {
            text.push('\n');
        }
        text.push_str(&chunk.text);
    }
    text
}

// ── Internals ──────────────────────────────────────────────────────

/// The chunk currently being accumulated.
struct Pending {
    text: String,
    after_newline: bool,
}

#[derive(Default)]
struct ChunkSink {
    chunks: Vec<TextChunk>,
}

impl ChunkSink {
    fn emit(&mut self, text: String, after_newline: bool) {
        let index = self.chunks.len();
        self.chunks.push(TextChunk {
            index,
            text,
            after_newline,
        });
    }

    /// Start a new chunk with `line`. Oversized lines are hard-split; every
    /// piece but the last is emitted and the last stays open so following
    /// lines can still join it.
    fn open_line(&mut self, line: &str, after_newline: bool, max_bytes: usize) -> Pending {
        if line.len() <= max_bytes {
            return Pending {
                text: line.to_string(),
                after_newline,
            };
        }

        let mut pieces = hard_split_line(line, max_bytes);
        // Non-empty line, so at least one piece.
        let last = pieces.pop().unwrap_or_default();
        let mut first = true;
        for piece in pieces {
            self.emit(piece, after_newline && first);
            first = false;
        }
        Pending {
            text: last,
            after_newline: after_newline && first,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GRIN: &str = "\u{1F600}";

    #[test]
    fn short_message_returns_single_chunk() {
        assert_eq!(split_message("hello", 100), vec!["hello"]);
    }

    #[test]
    fn empty_string_yields_one_empty_chunk() {
        assert_eq!(split_message("", 100), vec![""]);
    }

    #[test]
    fn exact_limit_is_not_split() {
        let text = "a".repeat(100);
        assert_eq!(split_message(&text, 100), vec![text]);
    }

    #[test]
    fn splits_on_newlines() {
        let result = split_message("line1\nline2\nline3", 12);
        assert_eq!(result, vec!["line1\nline2", "line3"]);
    }

    #[test]
    fn multibyte_characters_are_never_cut() {
        let text = GRIN.repeat(5);
        let chunks = split_chunks(&text, 10);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.byte_len() <= 10);
        }
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn single_long_line_is_hard_split() {
        let text = "a".repeat(200);
        let result = split_message(&text, 50);
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|c| c.len() <= 50));
        assert_eq!(result.concat(), text);
    }

    #[test]
    fn line_split_output_rejoins_with_newlines() {
        let lines: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        let text = lines.join("\n");
        let result = split_message(&text, 100);
        assert!(result.len() > 1);
        assert_eq!(result.join("\n"), text);
    }

    #[test]
    fn empty_lines_survive_splitting() {
        let text = "\n\nabc\n\n\ndef\n";
        let chunks = split_chunks(text, 4);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn hard_split_tail_absorbs_following_lines() {
        let text = format!("{}\nb", "a".repeat(12));
        let chunks = split_chunks(&text, 5);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaaa", "aaaaa", "aa\nb"]);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn chunk_indices_are_sequential() {
        let text = "x".repeat(35);
        let chunks = split_chunks(&text, 10);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn hard_split_ascii() {
        let line = "a".repeat(100);
        let result = hard_split_line(&line, 30);
        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|c| c.len() <= 30));
        assert_eq!(result.concat(), line);
    }

    #[test]
    fn hard_split_multibyte_packs_two_per_chunk() {
        let line = GRIN.repeat(6);
        let result = hard_split_line(&line, 10);
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|c| c.len() == 8));
        assert_eq!(result.concat(), line);
    }

    #[test]
    fn hard_split_empty_line() {
        assert!(hard_split_line("", 10).is_empty());
    }

    #[test]
    fn oversized_character_is_emitted_alone_without_empty_artifact() {
        let line = GRIN.repeat(2);
        let result = hard_split_line(&line, 3);
        assert_eq!(result, vec![GRIN, GRIN]);

        let chunks = split_message(&format!("ab{line}"), 3);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(chunks.concat(), format!("ab{line}"));
    }

    fn text_with_newlines() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                3 => Just('\n'),
                5 => prop::char::range('a', 'z'),
                2 => any::<char>(),
            ],
            0..300,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    proptest! {
        #[test]
        fn reassembly_reproduces_input(text in text_with_newlines(), max in 1usize..64) {
            let chunks = split_chunks(&text, max);
            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(reassemble(&chunks), text);
        }

        #[test]
        fn chunks_respect_budget(text in text_with_newlines(), max in 1usize..64) {
            for chunk in split_chunks(&text, max) {
                let single_wide_char =
                    chunk.text.chars().count() == 1 && chunk.byte_len() > max;
                prop_assert!(chunk.byte_len() <= max || single_wide_char,
                    "chunk of {} bytes over budget {}", chunk.byte_len(), max);
            }
        }

        #[test]
        fn first_chunk_never_follows_newline(text in text_with_newlines(), max in 1usize..64) {
            let chunks = split_chunks(&text, max);
            prop_assert!(!chunks[0].after_newline);
        }
    }
}

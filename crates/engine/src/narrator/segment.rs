//! Streaming sentence segmentation.
//!
//! Incoming chunks are appended to a rolling buffer. A sentence is
//! emitted when the buffer contains a terminator (`.`, `!`, `?`, `…`),
//! optionally followed by closing quotes, then whitespace, and when
//! the text before a period is not a known abbreviation or a single
//! uppercase initial. Trailing partial text is flushed as a final
//! sentence at stream end.

/// Abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &["Mr", "Mrs", "Ms", "Dr", "St", "etc", "vs"];

#[derive(Default)]
pub struct SentenceSegmenter {
    buf: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return any sentences it completed, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);
        let mut sentences = Vec::new();
        while let Some(end) = find_boundary(&self.buf) {
            let rest = self.buf.split_off(end);
            let sentence = std::mem::replace(&mut self.buf, rest);
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_owned());
            }
        }
        sentences
    }

    /// Flush trailing partial text as the final sentence at stream end.
    pub fn flush(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.buf);
        let tail = tail.trim();
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_owned())
        }
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closing_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201d}' | '\u{2019}')
}

/// Byte offset one past the end of the first completed sentence
/// (through any closing quotes, before the following whitespace), or
/// `None` when the buffer holds no decidable boundary yet.
fn find_boundary(buf: &str) -> Option<usize> {
    let chars: Vec<(usize, char)> = buf.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if !is_terminator(c) {
            i += 1;
            continue;
        }

        // Consume closing quotes directly after the terminator so quoted
        // dialogue emits as one sentence.
        let mut j = i + 1;
        while j < chars.len() && is_closing_quote(chars[j].1) {
            j += 1;
        }
        if j >= chars.len() {
            // Terminator at the buffer edge: undecidable until more
            // input arrives (or the stream ends and flush runs).
            return None;
        }
        if !chars[j].1.is_whitespace() {
            // "3.5", "e.g", mid-word punctuation.
            i += 1;
            continue;
        }
        if c == '.' && is_abbreviation_before(buf, pos) {
            i = j;
            continue;
        }
        return Some(chars[j].0);
    }
    None
}

/// Whether the word ending at `terminator_pos` is on the abbreviation
/// denylist or reads as a single uppercase initial.
fn is_abbreviation_before(buf: &str, terminator_pos: usize) -> bool {
    let prefix = &buf[..terminator_pos];
    let word_start = prefix
        .rfind(|c: char| !c.is_alphanumeric())
        .map(|p| p + prefix[p..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    let word = &prefix[word_start..];
    if word.is_empty() {
        return false;
    }
    if ABBREVIATIONS.iter().any(|a| a.eq_ignore_ascii_case(word)) {
        return true;
    }
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_all(chunks: &[&str]) -> (Vec<String>, Option<String>) {
        let mut seg = SentenceSegmenter::new();
        let mut sentences = Vec::new();
        for chunk in chunks {
            sentences.extend(seg.push(chunk));
        }
        let tail = seg.flush();
        (sentences, tail)
    }

    #[test]
    fn two_sentences_in_one_chunk() {
        let (sentences, tail) =
            segment_all(&["You push the door open. It groans on rusted hinges. "]);
        assert_eq!(
            sentences,
            vec!["You push the door open.", "It groans on rusted hinges."]
        );
        assert!(tail.is_none());
    }

    #[test]
    fn sentence_split_across_chunks() {
        let (sentences, tail) = segment_all(&["You push the ", "door open", ". The hall ", "is dark."]);
        assert_eq!(sentences, vec!["You push the door open."]);
        assert_eq!(tail.as_deref(), Some("The hall is dark."));
    }

    #[test]
    fn terminator_at_chunk_edge_waits_for_whitespace() {
        let mut seg = SentenceSegmenter::new();
        assert!(seg.push("Done.").is_empty());
        assert_eq!(seg.push(" Next"), vec!["Done."]);
        assert_eq!(seg.flush().as_deref(), Some("Next"));
    }

    #[test]
    fn abbreviations_do_not_split() {
        let (sentences, tail) = segment_all(&["Dr. Harrow nods at Mr. Pell. She leaves. "]);
        assert_eq!(sentences, vec!["Dr. Harrow nods at Mr. Pell.", "She leaves."]);
        assert!(tail.is_none());
    }

    #[test]
    fn single_uppercase_initials_do_not_split() {
        let (sentences, _) = segment_all(&["J. R. R. Tolkien wrote it. True. "]);
        assert_eq!(sentences, vec!["J. R. R. Tolkien wrote it.", "True."]);
    }

    #[test]
    fn quoted_dialogue_emits_with_the_quote() {
        // A terminator inside quotes also emits; the quote stays attached.
        let (sentences, tail) = segment_all(&["\"Stop!\" she cried. They ran. "]);
        assert_eq!(sentences, vec!["\"Stop!\"", "she cried.", "They ran."]);
        assert!(tail.is_none());
    }

    #[test]
    fn ellipsis_character_terminates() {
        let (sentences, _) = segment_all(&["The torch gutters… Darkness. "]);
        assert_eq!(sentences, vec!["The torch gutters…", "Darkness."]);
    }

    #[test]
    fn ascii_ellipsis_emits_once_at_the_end() {
        let (sentences, _) = segment_all(&["He waited... Nothing came. "]);
        assert_eq!(sentences, vec!["He waited...", "Nothing came."]);
    }

    #[test]
    fn decimals_do_not_split() {
        let (sentences, _) = segment_all(&["The vial holds 3.5 ounces of ether. Careful. "]);
        assert_eq!(
            sentences,
            vec!["The vial holds 3.5 ounces of ether.", "Careful."]
        );
    }

    #[test]
    fn question_and_exclamation_terminate() {
        let (sentences, _) = segment_all(&["Who goes there? Show yourself! Now. "]);
        assert_eq!(sentences, vec!["Who goes there?", "Show yourself!", "Now."]);
    }

    #[test]
    fn trailing_partial_flushes() {
        let (sentences, tail) = segment_all(&["The corridor stretches on and"]);
        assert!(sentences.is_empty());
        assert_eq!(tail.as_deref(), Some("The corridor stretches on and"));
    }

    #[test]
    fn flush_on_empty_buffer_is_none() {
        let mut seg = SentenceSegmenter::new();
        assert!(seg.flush().is_none());
    }

    #[test]
    fn curly_quote_after_terminator_is_included() {
        let (sentences, _) = segment_all(&["\u{201c}Run!\u{201d} he said. Fine. "]);
        assert_eq!(
            sentences,
            vec!["\u{201c}Run!\u{201d}", "he said.", "Fine."]
        );
    }
}

use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Splits text on the coarsest separator that keeps pieces under the chunk
/// size, then greedily merges pieces back into chunks with a trailing overlap.
/// Lengths are measured in characters.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl RecursiveChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let (separator, rest) = match separators.get(idx) {
            Some(sep) => (sep.as_str(), &separators[idx + 1..]),
            None => ("", &separators[0..0]),
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(&short, separator));
                short.clear();
            }
            if rest.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, rest));
            }
        }
        if !short.is_empty() {
            chunks.extend(self.merge(&short, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joined_sep = if window.is_empty() { 0 } else { sep_len };
            if total + len + joined_sep > self.chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window, separator);
                // Drop from the front until only the overlap remains and the
                // next piece fits
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let had_many = window.len() > 1;
                    let Some(first) = window.pop_front() else { break };
                    total -= char_len(first) + if had_many { sep_len } else { 0 };
                }
            }
            window.push_back(piece);
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }
        push_joined(&mut docs, &window, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = RecursiveChunker::default().split("A single short paragraph.");
        assert_eq!(chunks, vec!["A single short paragraph."]);
    }

    #[test]
    fn words_merge_with_overlap() {
        let chunks = RecursiveChunker::new(10, 3).split("a b c d e f g h i j k");
        assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j k"]);
    }

    #[test]
    fn paragraphs_are_preferred_boundaries() {
        let text = format!("{}\n\n{}", "x".repeat(300), "y".repeat(300));
        let chunks = RecursiveChunker::default().split(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chars().all(|c| c == 'x'));
        assert!(chunks[1].chars().all(|c| c == 'y'));
    }

    #[test]
    fn long_runs_fall_back_to_characters() {
        let chunks = RecursiveChunker::new(10, 0).split(&"z".repeat(25));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| char_len(c) <= 10));
    }

    #[test]
    fn every_chunk_respects_size() {
        let text = "The river bends. ".repeat(200);
        let chunks = RecursiveChunker::default().split(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| char_len(c) <= DEFAULT_CHUNK_SIZE));
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(RecursiveChunker::default().split("   \n\n  ").is_empty());
    }
}

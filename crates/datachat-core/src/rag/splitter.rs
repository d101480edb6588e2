//! Character-budget text chunking for index generation.

pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Splits text on the coarsest separator that keeps chunks under budget,
/// falling back to finer separators (paragraph, line, sentence, word) and
/// finally to a hard cut.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size / 2),
            separators: vec!["\n\n", "\n", ". ", " "],
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() <= self.chunk_size {
            return vec![text.to_string()];
        }
        self.split_with(text, 0)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, level: usize) -> Vec<String> {
        let Some(separator) = self.separators.get(level) else {
            return self.hard_split(text);
        };

        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in text.split(separator) {
            if piece.len() > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(self.split_with(piece, level + 1));
                continue;
            }

            let candidate_len = if current.is_empty() {
                piece.len()
            } else {
                current.len() + separator.len() + piece.len()
            };

            if candidate_len > self.chunk_size && !current.is_empty() {
                let tail = self.overlap_tail(&current);
                chunks.push(std::mem::replace(&mut current, tail));
                if current.len() + separator.len() + piece.len() > self.chunk_size {
                    current.clear();
                }
            }

            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(piece);
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn overlap_tail(&self, chunk: &str) -> String {
        if self.chunk_overlap == 0 || chunk.len() <= self.chunk_overlap {
            return String::new();
        }
        let mut start = chunk.len() - self.chunk_overlap;
        while !chunk.is_char_boundary(start) {
            start += 1;
        }
        chunk[start..].to_string()
    }

    fn hard_split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < text.len() {
            let mut end = (start + self.chunk_size).min(text.len());
            while end > start && !text.is_char_boundary(end) {
                end -= 1;
            }
            if end == start {
                // A single multi-byte character wider than the budget.
                end = text[start..]
                    .char_indices()
                    .nth(1)
                    .map(|(i, _)| start + i)
                    .unwrap_or(text.len());
            }
            chunks.push(text[start..end].to_string());
            start = end;
        }
        chunks
    }
}

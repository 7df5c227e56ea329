use crate::config::Chunking;
use serde::{Deserialize, Serialize};

/// A slice of reference text; offsets are byte positions into the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Serializable summary of how a reference text would be split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub source: String,
    pub char_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub spans: Vec<SpanSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanSummary {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub chars: usize,
}

impl ChunkPlan {
    pub fn from_text(cfg: &Chunking, source: &str, text: &str) -> ChunkPlan {
        let spans = split_text(text, cfg)
            .into_iter()
            .enumerate()
            .map(|(index, s)| SpanSummary {
                index,
                start: s.start,
                end: s.end,
                chars: s.text.chars().count(),
            })
            .collect();
        ChunkPlan {
            source: source.to_string(),
            char_count: text.chars().count(),
            chunk_size: cfg.chunk_size,
            chunk_overlap: cfg.chunk_overlap,
            spans,
        }
    }
}

/// Splits `text` into windows of at most `chunk_size` characters, preferring
/// to break on the configured separators in order, with consecutive windows
/// overlapping by up to `chunk_overlap` characters.
pub fn split_text(text: &str, cfg: &Chunking) -> Vec<TextSpan> {
    let size = cfg.chunk_size.max(1);
    let overlap = cfg.chunk_overlap.min(size - 1);
    let seps: Vec<&str> = cfg
        .separators
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();

    let mut spans = Vec::new();
    let mut start = 0usize;

    loop {
        start = skip_whitespace(text, start);
        if start >= text.len() {
            break;
        }

        let hard_end = byte_after_chars(text, start, size);
        let end = if hard_end >= text.len() {
            text.len()
        } else {
            break_point(&text[start..hard_end], &seps)
                .map(|p| start + p)
                .unwrap_or(hard_end)
        };

        let raw = &text[start..end];
        let trimmed = raw.trim_end();
        if !trimmed.is_empty() {
            spans.push(TextSpan {
                text: trimmed.to_string(),
                start,
                end: start + trimmed.len(),
            });
        }

        if end >= text.len() {
            break;
        }

        let next = overlap_start(text, end, overlap, &seps);
        start = if next > start { next } else { end };
    }

    spans
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

fn byte_after_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Byte offset within `window` just past the best separator. A separator in
/// the second half of the window wins in priority order; failing that, any
/// occurrence past the first byte.
fn break_point(window: &str, seps: &[&str]) -> Option<usize> {
    let half = window.len() / 2;
    for sep in seps {
        if let Some(p) = window.rfind(sep) {
            if p >= half {
                return Some(p + sep.len());
            }
        }
    }
    for sep in seps {
        if let Some(p) = window.rfind(sep) {
            if p > 0 {
                return Some(p + sep.len());
            }
        }
    }
    None
}

fn overlap_start(text: &str, end: usize, overlap: usize, seps: &[&str]) -> usize {
    if overlap == 0 {
        return end;
    }
    let ov = text[..end]
        .char_indices()
        .rev()
        .nth(overlap - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &text[ov..end];
    for sep in seps {
        if let Some(p) = tail.find(sep) {
            let candidate = ov + p + sep.len();
            if candidate < end {
                return candidate;
            }
        }
    }
    ov
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_point_skips_early_paragraph_break() {
        let w = "aaaa\n\nbbbbbbbb\ncc";
        assert_eq!(break_point(w, &["\n\n", "\n"]), Some(15));
    }

    #[test]
    fn overlap_lands_after_separator() {
        let text = "one two three four";
        // 8 chars back from the end is inside "three"; next break is after the space.
        assert_eq!(overlap_start(text, text.len(), 8, &[" "]), 14);
    }
}

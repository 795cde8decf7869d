//! Word-window chunking with page and position tracking

use super::parser::ExtractedText;

/// A chunk cut from extracted text, before it is embedded and persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    /// 0-based position within the document
    pub index: u32,
    /// Window tokens joined with single spaces
    pub content: String,
    /// Char offset of the first token
    pub start_char: usize,
    /// Char offset just past the last token
    pub end_char: usize,
    pub page_number: u32,
}

/// A whitespace-delimited token with its byte and char range
#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    char_start: usize,
    char_end: usize,
}

impl Token<'_> {
    fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Split on whitespace, recording char offsets of each token
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, usize)> = None; // (byte_start, char_start)
    let mut char_pos = 0usize;

    for (byte_pos, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some((byte_start, char_start)) = current.take() {
                tokens.push(Token {
                    text: &text[byte_start..byte_pos],
                    char_start,
                    char_end: char_pos,
                });
            }
        } else if current.is_none() {
            current = Some((byte_pos, char_pos));
        }
        char_pos += 1;
    }

    if let Some((byte_start, char_start)) = current {
        tokens.push(Token {
            text: &text[byte_start..],
            char_start,
            char_end: char_pos,
        });
    }

    tokens
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Maximum window length in characters
    chunk_size: usize,
    /// Overlap budget; `overlap / 10` trailing words seed the next window
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Number of trailing words carried into the next window
    pub fn seed_words(&self) -> usize {
        self.overlap / 10
    }

    /// Chunk extracted text into overlapping word windows
    pub fn chunk(&self, extracted: &ExtractedText) -> Vec<ChunkDraft> {
        let tokens = tokenize(&extracted.text);
        let seed = self.seed_words();

        let mut drafts = Vec::new();
        let mut window: Vec<Token<'_>> = Vec::new();
        let mut window_len = 0usize;

        for token in tokens {
            if !window.is_empty() && window_len + token.char_len() + 1 > self.chunk_size {
                drafts.push(self.close_window(&window, drafts.len() as u32, extracted));

                if seed > 0 && window.len() > seed {
                    window.drain(..window.len() - seed);
                    window_len = window.iter().map(|t| t.char_len() + 1).sum();
                } else {
                    window.clear();
                    window_len = 0;
                }
            }

            window_len += token.char_len() + 1;
            window.push(token);
        }

        if !window.is_empty() {
            drafts.push(self.close_window(&window, drafts.len() as u32, extracted));
        }

        drafts
    }

    fn close_window(&self, window: &[Token<'_>], index: u32, extracted: &ExtractedText) -> ChunkDraft {
        let start_char = window.first().map(|t| t.char_start).unwrap_or(0);
        let end_char = window.last().map(|t| t.char_end).unwrap_or(start_char);
        let content = window.iter().map(|t| t.text).collect::<Vec<_>>().join(" ");

        ChunkDraft {
            index,
            content,
            start_char,
            end_char,
            page_number: extracted.page_for_offset(start_char),
        }
    }
}

//! Text pagination for the lens display.
//!
//! Raw text is wrapped into display lines, lines are grouped into pages, and
//! each page's UTF-8 text is split into transport-sized chunks. Pagination is
//! eager: the whole page list is produced up front because chunk counts go
//! into the header of the very first frame.
//!
//! The pager is pure and deterministic so it can be tested without a lens.

use crate::proto::{ContentStatus, DisplayPage, ProtocolError, StatusFlags, MAX_CHUNK_PAYLOAD};

/// Soft wrap width, in characters
pub const LINE_WIDTH: usize = 40;

/// Lines shown on one screen
pub const LINES_PER_PAGE: usize = 5;

/// One screen of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Wrapped lines (at most [`LINES_PER_PAGE`])
    pub lines: Vec<String>,
    /// One-based page number
    pub page_number: u8,
    /// Number of pages in the message
    pub total_pages: u8,
    /// Normal for every page but the last
    pub status: ContentStatus,
    /// UTF-8 text split into chunks of at most [`MAX_CHUNK_PAYLOAD`] bytes
    pub chunks: Vec<Vec<u8>>,
}

impl Page {
    /// Page text as shown on the lens
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Build the display frames for this page.
    pub fn frames(&self, sequence_id: u8, new_content: bool) -> Vec<DisplayPage> {
        // at most five chunks: 5 lines of 40 chars, up to 4 bytes each
        let total_chunks = self.chunks.len() as u8;
        let status = StatusFlags::new(self.status, new_content);

        self.chunks
            .iter()
            .zip(0u8..)
            .map(|(chunk, chunk_index)| DisplayPage {
                sequence_id,
                total_chunks,
                chunk_index,
                status,
                page_number: self.page_number,
                total_pages: self.total_pages,
                payload: chunk.clone(),
            })
            .collect()
    }
}

/// Split text into display pages.
///
/// Returns an empty list when the text holds nothing but whitespace, and
/// [`ProtocolError::TooManyPages`] when the page count does not fit the
/// one-byte page fields of the header.
pub fn paginate(text: &str) -> Result<Vec<Page>, ProtocolError> {
    let lines = wrap_lines(text);
    let page_count = lines.len().div_ceil(LINES_PER_PAGE);
    let total_pages =
        u8::try_from(page_count).map_err(|_| ProtocolError::TooManyPages(page_count))?;

    let pages = lines
        .chunks(LINES_PER_PAGE)
        .zip(1..=total_pages)
        .map(|(page_lines, page_number)| {
            let status = if page_number == total_pages {
                ContentStatus::Final
            } else {
                ContentStatus::Normal
            };
            let text = page_lines.join("\n");
            Page {
                lines: page_lines.to_vec(),
                page_number,
                total_pages,
                status,
                chunks: text
                    .as_bytes()
                    .chunks(MAX_CHUNK_PAYLOAD)
                    .map(<[u8]>::to_vec)
                    .collect(),
            }
        })
        .collect();
    Ok(pages)
}

/// Wrap text into lines of at most [`LINE_WIDTH`] characters.
pub fn wrap_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
        let mut rest = paragraph;
        while rest.chars().count() > LINE_WIDTH {
            let (line, remainder) = split_at_break(rest);
            lines.push(line.to_string());
            rest = remainder.trim();
        }
        if !rest.is_empty() {
            lines.push(rest.to_string());
        }
    }

    lines
}

/// Split before the last space among the first [`LINE_WIDTH`] characters, or
/// hard-break at [`LINE_WIDTH`] when there is none.
fn split_at_break(text: &str) -> (&str, &str) {
    let mut hard_break = text.len();
    let mut last_space = None;

    for (count, (offset, ch)) in text.char_indices().enumerate() {
        if count == LINE_WIDTH {
            hard_break = offset;
            break;
        }
        if ch == ' ' && offset > 0 {
            last_space = Some(offset);
        }
    }

    text.split_at(last_space.unwrap_or(hard_break))
}

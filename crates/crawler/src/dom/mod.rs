// ABOUTME: DOM traversal utilities for HTML parsing.
// ABOUTME: Provides visible-text walking and boilerplate detection over scraper's document tree.

//! DOM utilities for text extraction.
//!
//! Text is gathered by an explicit-stack walk rather than recursion so that
//! pathologically deep documents cannot overflow the stack.

pub mod boilerplate;
pub mod text;

pub use boilerplate::looks_like_boilerplate;
pub use text::{collect_ids, is_excluded, is_hidden, normalize_whitespace, visible_text, visible_text_excluding};

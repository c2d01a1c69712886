//! Pipeline stages for segmentation and extraction.
//!
//! Each submodule implements exactly one transformation step and is testable
//! on its own.
//!
//! ## Data Flow
//!
//! ```text
//! segmentation:  text ──▶ pages ──▶ records
//! extraction:    input ──▶ trim ──▶ (engine) ──▶ parse
//! ```
//!
//! 1. [`markers`]: compile boundary phrases; the single `matches` function
//!    both segmenters use
//! 2. [`pages`]: cut a line stream at page markers
//! 3. [`records`]: merge pages into records, honouring fixed-span markers
//! 4. [`input`]: load document arrays, schemas, raw text and marker files
//! 5. [`trim`]: normalise a document and fit it to the token budget
//! 6. [`parse`]: rebuild JSON from a completion that continues the prompt

pub mod input;
pub mod markers;
pub mod pages;
pub mod parse;
pub mod records;
pub mod trim;

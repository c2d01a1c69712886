//! Page segmentation: cut a raw line stream at page-boundary markers.
//!
//! Scanned-document dumps usually carry a stamp (Bates number, FOIL request
//! id, "Page N of M") on every physical page. A line matching one of the page
//! markers closes the current page, inclusive of the marker line itself.

use crate::pipeline::markers::MarkerSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A contiguous run of lines ending at a page marker or end of input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based ordinal among the emitted pages.
    pub number: usize,
    /// 1-based line number of the page's first line in the source stream.
    pub first_line: usize,
    /// The page's lines, concatenated with their original terminators.
    pub text: String,
}

struct PageBuffer {
    first_line: usize,
    text: String,
}

/// Split `lines` into pages.
///
/// Lines are expected to keep their terminators (as produced by
/// [`str::split_inclusive`]), so concatenating the pages reproduces the input.
/// The first line only seeds the first page; every later line is appended to
/// the current page and, if it matches a marker, opens a new one. Pages that
/// are blank after stripping are dropped, which also discards the empty page
/// opened by a marker on the last line.
pub fn segment_pages<I, S>(lines: I, markers: &MarkerSet) -> Vec<Page>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buffers: Vec<PageBuffer> = Vec::new();
    let mut line_count = 0;

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = line.as_ref();
        line_count = line_no;

        let Some(current) = buffers.last_mut() else {
            buffers.push(PageBuffer {
                first_line: line_no,
                text: line.to_string(),
            });
            continue;
        };

        current.text.push_str(line);
        if let Some(marker) = markers.matches(line) {
            trace!(line = line_no, marker = marker.text(), "page boundary");
            buffers.push(PageBuffer {
                first_line: line_no + 1,
                text: String::new(),
            });
        }
    }

    let pages: Vec<Page> = buffers
        .into_iter()
        .filter(|b| !b.text.trim().is_empty())
        .enumerate()
        .map(|(i, b)| Page {
            number: i + 1,
            first_line: b.first_line,
            text: b.text,
        })
        .collect();

    debug!("Built {} pages from {} lines", pages.len(), line_count);
    pages
}

/// Convenience wrapper: split a whole text into lines and segment it.
pub fn segment_text(text: &str, markers: &MarkerSet) -> Vec<Page> {
    segment_pages(text.split_inclusive('\n'), markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::markers::MarkerSpec;

    fn foil() -> MarkerSet {
        MarkerSet::compile([MarkerSpec::new("FOIL G000569-102422")]).unwrap()
    }

    #[test]
    fn splits_after_marker_line() {
        let lines = ["Dear Sir,\n", "FOIL G000569-102422\n", "Body.\n"];
        let pages = segment_pages(lines, &foil());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].text, "Dear Sir,\nFOIL G000569-102422\n");
        assert_eq!(pages[1].text, "Body.\n");
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].first_line, 3);
    }

    #[test]
    fn marker_on_last_line_leaves_no_empty_page() {
        let lines = ["one\n", "FOIL G000569-102422\n"];
        let pages = segment_pages(lines, &foil());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "one\nFOIL G000569-102422\n");
    }

    #[test]
    fn trailing_whitespace_page_is_dropped() {
        let text = "a\nFOIL G000569-102422\nb\nFOIL G000569-102422\n\n  \n";
        let pages = segment_text(text, &foil());
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].number, 2);
        assert_eq!(pages[1].text, "b\nFOIL G000569-102422\n");
    }

    #[test]
    fn first_line_only_seeds() {
        let lines = ["FOIL G000569-102422\n", "rest\n"];
        let pages = segment_pages(lines, &foil());
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn no_markers_yields_single_page() {
        let pages = segment_text("x\ny\nz", &MarkerSet::default());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "x\ny\nz");
    }

    #[test]
    fn empty_input_yields_nothing() {
        let pages = segment_pages(Vec::<String>::new(), &foil());
        assert!(pages.is_empty());
    }
}

//! Record grouping: merge consecutive pages into logical records.
//!
//! A record (one notification letter, one reporting form) starts at a page
//! that begins with a record marker. Some record types are known to
//! span a fixed number of pages; their marker carries `pages: N` and the
//! grouper then *grabs* the following `N - 1` pages into the same record even
//! when one of them repeats the heading.
//!
//! The first page seeds the first record as is. The grab is a two-state
//! machine evaluated on every later page, in this order:
//!
//! 1. If a grab is active, count the page against it (the page is consumed).
//! 2. Check the page against the record markers; a match on a page that was
//!    not consumed by a grab opens a new record, and may arm a new grab.
//! 3. Append the page, followed by a newline, to the current record.

use crate::pipeline::markers::MarkerSet;
use crate::pipeline::pages::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One logical record assembled from one or more pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGroup {
    /// Concatenated page texts. Every page after the record stream's first
    /// is followed by a newline separator.
    pub text: String,
    /// 1-based ordinal of the record's first page.
    pub pg: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Grab {
    #[default]
    Idle,
    Grabbing { remaining: usize },
}

impl Grab {
    fn arm(pages: Option<usize>) -> Self {
        match pages {
            Some(n) if n > 1 => Grab::Grabbing { remaining: n - 1 },
            _ => Grab::Idle,
        }
    }

    /// Count one page against the grab. Returns `true` if the page belongs to it.
    fn consume(&mut self) -> bool {
        match *self {
            Grab::Idle => false,
            Grab::Grabbing { remaining } => {
                *self = if remaining > 1 {
                    Grab::Grabbing {
                        remaining: remaining - 1,
                    }
                } else {
                    Grab::Idle
                };
                true
            }
        }
    }
}

/// Group `pages` into records using `markers`.
///
/// Every page lands in exactly one group and groups keep page order. The
/// first page seeds the first group verbatim and is not checked against the
/// markers. Later pages are tested with leading blank lines removed.
pub fn group_records(pages: Vec<Page>, markers: &MarkerSet) -> Vec<PageGroup> {
    let page_count = pages.len();
    let mut pages = pages.into_iter();
    let Some(first) = pages.next() else {
        return Vec::new();
    };

    let mut groups = vec![PageGroup {
        text: first.text,
        pg: 1,
    }];
    let mut grab = Grab::Idle;

    for (idx, page) in pages.enumerate() {
        let pg = idx + 2;
        let consumed = grab.consume();
        match markers.matches(page.text.trim_start()) {
            Some(marker) if consumed => {
                trace!(pg, marker = marker.text(), "marker inside grabbed page ignored");
            }
            Some(marker) => {
                trace!(pg, marker = marker.text(), "record boundary");
                groups.push(PageGroup {
                    text: String::new(),
                    pg,
                });
                grab = Grab::arm(marker.pages());
            }
            None => {}
        }

        if let Some(current) = groups.last_mut() {
            current.text.push_str(&page.text);
            current.text.push('\n');
        }
    }

    groups.retain(|g| !g.text.trim().is_empty());
    debug!("Built {} records from {} pages", groups.len(), page_count);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::markers::MarkerSpec;

    fn page(number: usize, text: &str) -> Page {
        Page {
            number,
            first_line: number,
            text: text.to_string(),
        }
    }

    fn pages(texts: &[&str]) -> Vec<Page> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| page(i + 1, t))
            .collect()
    }

    fn markers(specs: Vec<MarkerSpec>) -> MarkerSet {
        MarkerSet::compile(specs).unwrap()
    }

    #[test]
    fn grab_counts_down_then_releases() {
        let mut grab = Grab::arm(Some(3));
        assert_eq!(grab, Grab::Grabbing { remaining: 2 });
        assert!(grab.consume());
        assert!(grab.consume());
        assert_eq!(grab, Grab::Idle);
        assert!(!grab.consume());
    }

    #[test]
    fn single_page_marker_does_not_arm() {
        assert_eq!(Grab::arm(Some(1)), Grab::Idle);
        assert_eq!(Grab::arm(None), Grab::Idle);
    }

    #[test]
    fn marker_starts_new_group() {
        let set = markers(vec![MarkerSpec::new("NOTICE OF DATA BREACH")]);
        let groups = group_records(
            pages(&["cover letter\n", "NOTICE OF DATA BREACH\nDear customer\n", "more\n"]),
            &set,
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].pg, 1);
        assert_eq!(groups[0].text, "cover letter\n");
        assert_eq!(groups[1].pg, 2);
        assert_eq!(groups[1].text, "NOTICE OF DATA BREACH\nDear customer\n\nmore\n\n");
    }

    #[test]
    fn spanning_marker_absorbs_repeated_heading() {
        let set = markers(vec![MarkerSpec::spanning("SECURITY BREACH REPORTING FORM", 2)]);
        let groups = group_records(
            pages(&[
                "intro\n",
                "SECURITY BREACH REPORTING FORM\npage one\n",
                "SECURITY BREACH REPORTING FORM\npage two\n",
                "SECURITY BREACH REPORTING FORM\nnext form\n",
            ]),
            &set,
        );
        let starts: Vec<usize> = groups.iter().map(|g| g.pg).collect();
        assert_eq!(starts, vec![1, 2, 4]);
        assert!(groups[1].text.contains("page two"));
    }

    #[test]
    fn first_page_seeds_verbatim() {
        let set = markers(vec![MarkerSpec::new("NOTICE OF DATA BREACH")]);
        let groups = group_records(pages(&["p1\nFOIL X\n", "p2\n"]), &set);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text, "p1\nFOIL X\np2\n\n");
    }

    #[test]
    fn first_page_does_not_arm_grab() {
        let set = markers(vec![MarkerSpec::spanning("REPORTING FORM", 2)]);
        let groups = group_records(
            pages(&["REPORTING FORM\n1\n", "REPORTING FORM\n2\n", "REPORTING FORM\n3\n"]),
            &set,
        );
        let starts: Vec<usize> = groups.iter().map(|g| g.pg).collect();
        assert_eq!(starts, vec![1, 2]);
        assert!(groups[1].text.contains("REPORTING FORM\n3\n"));
    }

    #[test]
    fn leading_blank_lines_do_not_hide_marker() {
        let set = markers(vec![MarkerSpec::new("NOTICE OF DATA BREACH")]);
        let groups = group_records(pages(&["a\n", "\n\n  NOTICE OF DATA BREACH\n"]), &set);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn no_pages_no_groups() {
        assert!(group_records(Vec::new(), &MarkerSet::default()).is_empty());
    }
}

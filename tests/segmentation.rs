//! Integration tests for the offline segmentation path: raw text → pages →
//! record groups → `{text, pg}` JSON.

use recordscrape::pipeline::pages::segment_pages;
use recordscrape::pipeline::records::group_records;
use recordscrape::{split_text, split_to_file, MarkerConfig, MarkerSet, MarkerSpec};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

const STAMP: &str = "FOIL G000569-102422";

fn stamp_only() -> MarkerSet {
    MarkerSet::compile([MarkerSpec::new(STAMP)]).unwrap()
}

/// A release with a cover sheet, a two-page reporting form (both pages carry
/// the form heading), a one-page letter and a continuation page.
fn sample_release() -> String {
    [
        "Office of the New York State Attorney General\n",
        "Records Access Office\n",
        "FOIL G000569-102422\n",
        "NEW YORK STATE SECURITY BREACH REPORTING FORM\n",
        "Name of Business: Acme Widgets\n",
        "FOIL G000569-102422\n",
        "NEW YORK STATE SECURITY BREACH REPORTING FORM\n",
        "Number of NY residents affected: 12\n",
        "FOIL G000569-102422\n",
        "NOTICE OF DATA BREACH\n",
        "Dear Customer,\n",
        "FOIL G000569-102422\n",
        "Sincerely, Globex\n",
        "FOIL G000569-102422\n",
    ]
    .concat()
}

// ── Pages ────────────────────────────────────────────────────────────────────

#[test]
fn page_marker_line_closes_page() {
    let lines = ["Dear Sir,\n", "FOIL G000569-102422\n", "Body.\n"];
    let pages = segment_pages(lines, &stamp_only());
    let texts: Vec<&str> = pages.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["Dear Sir,\nFOIL G000569-102422\n", "Body.\n"]);
}

#[test]
fn pages_partition_the_line_stream() {
    let text = sample_release();
    let pages = segment_pages(text.split_inclusive('\n'), &stamp_only());
    let rebuilt: String = pages.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(rebuilt, text);
    let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
}

// ── Records ──────────────────────────────────────────────────────────────────

#[test]
fn spanning_form_and_letter_become_records() {
    let groups = split_text(&sample_release(), &MarkerConfig::ny_breach_notices()).unwrap();
    let starts: Vec<usize> = groups.iter().map(|g| g.pg).collect();
    assert_eq!(starts, vec![1, 2, 4]);

    assert!(groups[1].text.contains("Acme Widgets"));
    assert!(groups[1].text.contains("residents affected: 12"));
    assert!(groups[2].text.starts_with("NOTICE OF DATA BREACH"));
    assert!(groups[2].text.contains("Sincerely, Globex"));
}

#[test]
fn spanning_marker_grabs_page_without_marker_text() {
    let record_markers = MarkerSet::compile([MarkerSpec::spanning("REPORTING FORM", 2)]).unwrap();
    let pages = segment_pages(
        [
            "cover\n",
            "FOIL G000569-102422\n",
            "REPORTING FORM\n",
            "FOIL G000569-102422\n",
            "plain continuation\n",
            "FOIL G000569-102422\n",
        ],
        &stamp_only(),
    );
    let groups = group_records(pages, &record_markers);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].pg, 2);
    assert!(groups[1].text.contains("plain continuation"));
}

#[test]
fn first_group_starts_with_first_page_verbatim() {
    let page_markers = MarkerSet::compile([MarkerSpec::new("FOIL X")]).unwrap();
    let pages = segment_pages(["p1\n", "FOIL X\n", "p2\n"], &page_markers);
    let groups = group_records(pages, &MarkerSet::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].text, "p1\nFOIL X\np2\n\n");
}

#[test]
fn record_marker_must_open_the_page() {
    let record_markers = MarkerSet::compile([MarkerSpec::new("NOTICE OF DATA BREACH")]).unwrap();
    let pages = segment_pages(
        [
            "cover\n",
            "FOIL G000569-102422\n",
            "We are sending this NOTICE OF DATA BREACH because\n",
            "FOIL G000569-102422\n",
            "NOTICE OF DATA BREACH\n",
            "FOIL G000569-102422\n",
        ],
        &stamp_only(),
    );
    let starts: Vec<usize> = group_records(pages, &record_markers).iter().map(|g| g.pg).collect();
    assert_eq!(starts, vec![1, 3]);
}

#[test]
fn groups_cover_every_page_exactly_once() {
    let text = sample_release();
    let markers = MarkerConfig::ny_breach_notices();
    let pages = segment_pages(text.split_inclusive('\n'), &markers.page_set().unwrap());
    let expected: String = pages
        .iter()
        .enumerate()
        .map(|(i, p)| if i == 0 { p.text.clone() } else { format!("{}\n", p.text) })
        .collect();

    let groups = group_records(pages, &markers.record_set().unwrap());
    let joined: String = groups.iter().map(|g| g.text.as_str()).collect();
    assert_eq!(joined, expected);
}

// ── Files ────────────────────────────────────────────────────────────────────

#[test]
fn split_output_feeds_extraction_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("release.txt");
    let output = dir.path().join("records.json");
    std::fs::write(&input, sample_release()).unwrap();

    let stats = split_to_file(&input, &output, &MarkerConfig::ny_breach_notices()).unwrap();
    assert_eq!(stats.pages, 5);
    assert_eq!(stats.records, 3);

    let docs = recordscrape::pipeline::input::load_documents(
        &output,
        &recordscrape::pipeline::input::DocumentKeys::default(),
    )
    .unwrap();
    assert_eq!(docs.len(), 3);
    assert_eq!(docs[2].id.to_string(), "4");
}

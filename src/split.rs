//! Offline segmentation: raw text dump → pages → record groups → JSON.
//!
//! The output array of `{text, pg}` objects is directly usable as extraction
//! input with the default document keys.

use crate::error::RecordScrapeError;
use crate::output::write_json_atomic;
use crate::pipeline::input::read_lines;
use crate::pipeline::markers::MarkerConfig;
use crate::pipeline::pages::segment_pages;
use crate::pipeline::records::{group_records, PageGroup};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Counters for one segmentation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    pub lines: usize,
    pub pages: usize,
    pub records: usize,
    pub duration_ms: u64,
}

/// Segment `text` into record groups.
pub fn split_text(text: &str, markers: &MarkerConfig) -> Result<Vec<PageGroup>, RecordScrapeError> {
    let lines = text.split_inclusive('\n').map(Ok::<_, RecordScrapeError>);
    segment(lines, markers).map(|(_, groups)| groups)
}

/// Run both segmenters over a fallible line stream. The first read error
/// ends the stream and is returned once page segmentation has stopped.
fn segment<I, S>(lines: I, markers: &MarkerConfig) -> Result<(SplitStats, Vec<PageGroup>), RecordScrapeError>
where
    I: IntoIterator<Item = Result<S, RecordScrapeError>>,
    S: AsRef<str>,
{
    let page_markers = markers.page_set()?;
    let record_markers = markers.record_set()?;

    let mut line_count = 0;
    let mut failure = None;
    let lines = lines.into_iter().map_while(|line| match line {
        Ok(line) => {
            line_count += 1;
            Some(line)
        }
        Err(e) => {
            failure = Some(e);
            None
        }
    });
    let pages = segment_pages(lines, &page_markers);
    if let Some(e) = failure {
        return Err(e);
    }

    let page_count = pages.len();
    info!("Built {} pages from {} lines", page_count, line_count);

    let groups = group_records(pages, &record_markers);
    info!("Built {} records", groups.len());

    let stats = SplitStats {
        lines: line_count,
        pages: page_count,
        records: groups.len(),
        duration_ms: 0,
    };
    Ok((stats, groups))
}

/// Read and segment a raw text file, one line at a time.
pub fn split_file(path: &Path, markers: &MarkerConfig) -> Result<Vec<PageGroup>, RecordScrapeError> {
    segment(read_lines(path)?, markers).map(|(_, groups)| groups)
}

/// Segment `input_path` and write the groups to `output_path` as pretty JSON.
pub fn split_to_file(
    input_path: &Path,
    output_path: &Path,
    markers: &MarkerConfig,
) -> Result<SplitStats, RecordScrapeError> {
    let start = Instant::now();
    let (mut stats, groups) = segment(read_lines(input_path)?, markers)?;

    write_json_atomic(output_path, &groups)?;

    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

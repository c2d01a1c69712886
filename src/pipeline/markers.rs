//! Boundary markers: whitespace-tolerant, case-insensitive text patterns.
//!
//! A marker such as `"NOTICE OF  DATA BREACH"` is compiled into a regex where
//! every run of whitespace becomes `\s+` and everything else is matched
//! literally, ignoring case. A piece of text matches when it *begins* with the
//! marker; the marker does not have to cover the whole line. Whitespace runs
//! inside the marker may cross a line break, which is how OCR output tends to
//! wrap long letterheads.
//!
//! Marker vocabularies are plain data ([`MarkerConfig`]) loaded by the caller.
//! Matching itself is the single pure function [`matches`]; precedence among
//! markers is declaration order, so specific phrases should be listed before
//! generic fallbacks.

use crate::error::RecordScrapeError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Declarative form of a marker, as it appears in a marker file.
///
/// Deserialises from either a bare string or `{"text": …, "pages": N}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMarkerSpec")]
pub struct MarkerSpec {
    /// Phrase to look for.
    pub text: String,
    /// Number of pages a record opened by this marker is known to span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMarkerSpec {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        pages: Option<usize>,
    },
}

impl From<RawMarkerSpec> for MarkerSpec {
    fn from(raw: RawMarkerSpec) -> Self {
        match raw {
            RawMarkerSpec::Text(text) => MarkerSpec { text, pages: None },
            RawMarkerSpec::Full { text, pages } => MarkerSpec { text, pages },
        }
    }
}

impl MarkerSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pages: None,
        }
    }

    /// A marker whose record always spans `pages` pages.
    pub fn spanning(text: impl Into<String>, pages: usize) -> Self {
        Self {
            text: text.into(),
            pages: Some(pages),
        }
    }
}

/// A compiled marker.
#[derive(Debug, Clone)]
pub struct Marker {
    spec: MarkerSpec,
    pattern: Regex,
}

impl Marker {
    /// Compile one [`MarkerSpec`] into a case-insensitive line pattern.
    ///
    /// Blank markers are rejected: they would match every line.
    pub fn compile(spec: MarkerSpec) -> Result<Self, RecordScrapeError> {
        let trimmed = spec.text.trim();
        if trimmed.is_empty() {
            return Err(RecordScrapeError::InvalidMarker {
                marker: spec.text.clone(),
                detail: "marker text is blank".into(),
            });
        }

        let body = RE_WHITESPACE
            .split(trimmed)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"\s+");

        let pattern = RegexBuilder::new(&format!("^{body}"))
            .case_insensitive(true)
            .build()
            .map_err(|e| RecordScrapeError::InvalidMarker {
                marker: spec.text.clone(),
                detail: e.to_string(),
            })?;

        Ok(Self { spec, pattern })
    }

    pub fn text(&self) -> &str {
        &self.spec.text
    }

    pub fn pages(&self) -> Option<usize> {
        self.spec.pages
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Return the first marker, in declaration order, that matches `text`.
pub fn matches<'a>(text: &str, markers: &'a [Marker]) -> Option<&'a Marker> {
    markers.iter().find(|m| m.is_match(text))
}

/// An ordered collection of compiled markers.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn compile<I>(specs: I) -> Result<Self, RecordScrapeError>
    where
        I: IntoIterator<Item = MarkerSpec>,
    {
        let markers = specs
            .into_iter()
            .map(Marker::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { markers })
    }

    pub fn matches(&self, text: &str) -> Option<&Marker> {
        matches(text, &self.markers)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Page and record boundary vocabularies, as stored in a marker file.
///
/// ```json
/// {
///   "page_markers": ["FOIL G000569-102422"],
///   "record_markers": [
///     {"text": "NEW YORK STATE SECURITY BREACH REPORTING FORM", "pages": 2},
///     "NOTICE OF DATA BREACH"
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default)]
    pub page_markers: Vec<MarkerSpec>,
    #[serde(default)]
    pub record_markers: Vec<MarkerSpec>,
}

impl MarkerConfig {
    /// Vocabulary for the New York Attorney General breach-notification FOIL
    /// release: every scanned page carries the request's Bates stamp, and
    /// letters open with one of a handful of headings.
    pub fn ny_breach_notices() -> Self {
        Self {
            page_markers: vec![MarkerSpec::new("FOIL G000569-102422")],
            record_markers: vec![
                MarkerSpec::spanning("OFFICE OF THE ATTORNEY GENERAL LETITIA JAMES", 2),
                MarkerSpec::spanning("NEW YORK STATE SECURITY BREACH REPORTING FORM", 2),
                MarkerSpec::new("RE: NOTICE OF DATA BREACH"),
                MarkerSpec::new("NOTICE OF DATA BREACH"),
                MarkerSpec::new("Notification of Data Breach"),
                MarkerSpec::new("Notice of Data Security Incident"),
                // least specific
                MarkerSpec::new("inform you of an incident"),
                MarkerSpec::new("information may have been compromised"),
            ],
        }
    }

    pub fn page_set(&self) -> Result<MarkerSet, RecordScrapeError> {
        MarkerSet::compile(self.page_markers.iter().cloned())
    }

    pub fn record_set(&self) -> Result<MarkerSet, RecordScrapeError> {
        MarkerSet::compile(self.record_markers.iter().cloned())
    }
}

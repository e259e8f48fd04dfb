//! Printable ticket sheets.
//!
//! A sheet is an A4 PDF with twelve tickets per page. The front pages carry
//! a QR code linking to the ticket's user page; the back pages, printed after
//! all fronts, carry a QR code with the bare number for the check-in
//! scanners.

mod pdf;
pub mod qr;

pub use pdf::{page_count, CELLS_PER_PAGE};

use crate::types::{TicketNumber, TicketRange};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Errors from rendering a sheet.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Data does not fit in a QR code
    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    /// The configured font could not be read
    #[error("cannot read font {path}: {source}")]
    Font {
        /// Font file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// PDF writer error
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

/// What goes on a sheet besides the numbers.
#[derive(Debug, Clone)]
pub struct SheetOptions {
    /// Base URL of the user page, without trailing `/`
    pub base_url: String,
    /// TrueType font for captions; built-in Helvetica when `None`
    pub font_path: Option<PathBuf>,
    /// Caption on the front of each ticket
    pub front_caption: String,
    /// Caption on the back of each ticket
    pub back_caption: String,
    /// PDF document title
    pub title: String,
}

impl SheetOptions {
    /// Options with the default captions
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            font_path: None,
            front_caption: "Your queue page".to_string(),
            back_caption: "Check-in".to_string(),
            title: "Tickets".to_string(),
        }
    }

    /// Use a TrueType font for captions
    #[must_use]
    pub fn with_font(mut self, path: Option<PathBuf>) -> Self {
        self.font_path = path;
        self
    }

    /// Link encoded on the front of `ticket`
    #[must_use]
    pub fn ticket_url(&self, ticket: TicketNumber) -> String {
        format!("{}/user?ticket={ticket}", self.base_url)
    }
}

/// Pick the base URL for ticket links.
///
/// Prefers an explicit URL, then the request's `Host`, then localhost on
/// `port`. Hosts without a scheme get `http://`.
#[must_use]
pub fn resolve_base_url(explicit: Option<&str>, host: Option<&str>, port: u16) -> String {
    let chosen = explicit
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
        .or_else(|| host.filter(|h| !h.is_empty()).map(str::to_owned))
        .unwrap_or_else(|| format!("localhost:{port}"));

    let with_scheme = if chosen.starts_with("http://") || chosen.starts_with("https://") {
        chosen
    } else {
        format!("http://{chosen}")
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Render the sheet for every ticket in `range`.
///
/// CPU bound; call it from a blocking task.
///
/// # Errors
///
/// Returns [`SheetError`] if a QR code, the font or the PDF cannot be
/// produced.
pub fn render_sheet(range: &TicketRange, options: &SheetOptions) -> Result<Vec<u8>, SheetError> {
    let started = Instant::now();
    let bytes = pdf::render(range, options)?;

    crate::metrics::record_sheet_rendered(range.len(), started.elapsed());
    tracing::info!(
        range = %range,
        pages = page_count(range.len()),
        bytes = bytes.len(),
        "Rendered ticket sheet"
    );
    Ok(bytes)
}

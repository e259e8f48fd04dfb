//! PDF layout of the ticket sheet.
//!
//! Positions are computed in points from the top-left corner of the page and
//! flipped into PDF coordinates (origin bottom-left) only when drawing.

use super::qr::QrMatrix;
use super::{SheetError, SheetOptions};
use crate::types::{TicketNumber, TicketRange};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Pt, Rect, Rgb,
};
use std::fs::File;

/// A4 width in points
pub const PAGE_WIDTH: f32 = 595.0;
/// A4 height in points
pub const PAGE_HEIGHT: f32 = 842.0;
/// Page margin in points
pub const MARGIN: f32 = 10.0;
/// Ticket columns per page
pub const COLUMNS: u32 = 4;
/// Ticket rows per page
pub const ROWS: u32 = 3;
/// Tickets per page
pub const CELLS_PER_PAGE: u32 = COLUMNS * ROWS;

#[allow(clippy::cast_precision_loss)]
const CELL_WIDTH: f32 = (PAGE_WIDTH - 2.0 * MARGIN) / COLUMNS as f32;
#[allow(clippy::cast_precision_loss)]
const CELL_HEIGHT: f32 = (PAGE_HEIGHT - 2.0 * MARGIN) / ROWS as f32;

const LAYER: &str = "Tickets";

/// Which side of the sheet a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Caption, number and the link to the user page
    Front,
    /// Caption and the check-in code
    Back,
}

/// Pages needed for `tickets` tickets, fronts and backs.
#[must_use]
pub const fn page_count(tickets: u32) -> u32 {
    2 * tickets.div_ceil(CELLS_PER_PAGE)
}

/// Top-left corner of the cell at `index` on its page, in points from the
/// top-left of the page.
#[must_use]
#[allow(clippy::cast_precision_loss)] // index < CELLS_PER_PAGE
pub fn cell_origin(index: u32) -> (f32, f32) {
    let index = index % CELLS_PER_PAGE;
    let column = index % COLUMNS;
    let row = index / COLUMNS;
    (
        MARGIN + column as f32 * CELL_WIDTH,
        MARGIN + row as f32 * CELL_HEIGHT,
    )
}

/// Where the QR code of a cell goes: top-left offset within the cell and side
/// length, in points.
#[must_use]
pub fn qr_box(side: Side) -> (f32, f32, f32) {
    let top = match side {
        Side::Front => 60.0,
        Side::Back => 30.0,
    };
    let size = (CELL_WIDTH - 20.0).min(CELL_HEIGHT - top - 10.0);
    (10.0, top, size)
}

fn mm(points: f32) -> Mm {
    Mm::from(Pt(points))
}

fn pdf_error(error: impl std::fmt::Display) -> SheetError {
    SheetError::Pdf(error.to_string())
}

struct Fonts {
    caption: IndirectFontRef,
    number: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference, options: &SheetOptions) -> Result<Self, SheetError> {
        let number = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;

        let caption = match &options.font_path {
            Some(path) => {
                let file = File::open(path).map_err(|source| SheetError::Font {
                    path: path.clone(),
                    source,
                })?;
                doc.add_external_font(file).map_err(pdf_error)?
            },
            None => doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(pdf_error)?,
        };

        Ok(Self { caption, number })
    }
}

/// Text at `(x, y)` from the top-left of the page, `y` being the top of the
/// line.
fn text(layer: &PdfLayerReference, value: &str, size: f32, x: f32, y: f32, font: &IndirectFontRef) {
    layer.use_text(value, size, mm(x), mm(PAGE_HEIGHT - y - size), font);
}

#[allow(clippy::cast_precision_loss)] // QR codes are at most 179 modules wide
fn draw_qr(layer: &PdfLayerReference, matrix: &QrMatrix, x: f32, y: f32, size: f32) {
    let module = size / matrix.size() as f32;
    for run in matrix.dark_runs() {
        let left = x + run.column as f32 * module;
        let top = y + run.row as f32 * module;
        let right = left + run.len as f32 * module;
        let bottom = top + module;
        layer.add_rect(Rect::new(
            mm(left),
            mm(PAGE_HEIGHT - bottom),
            mm(right),
            mm(PAGE_HEIGHT - top),
        ));
    }
}

fn draw_cell(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    options: &SheetOptions,
    side: Side,
    index: u32,
    ticket: TicketNumber,
) -> Result<(), SheetError> {
    let (x, y) = cell_origin(index);
    let (qr_x, qr_y, qr_size) = qr_box(side);

    let payload = match side {
        Side::Front => {
            text(layer, &options.front_caption, 10.0, x + 5.0, y + 5.0, &fonts.caption);
            text(
                layer,
                &ticket.to_string(),
                20.0,
                x + CELL_WIDTH / 2.0 - 10.0,
                y + 30.0,
                &fonts.number,
            );
            options.ticket_url(ticket)
        },
        Side::Back => {
            text(layer, &options.back_caption, 12.0, x + 5.0, y + 5.0, &fonts.caption);
            ticket.to_string()
        },
    };

    let matrix = QrMatrix::encode(&payload)?;
    draw_qr(layer, &matrix, x + qr_x, y + qr_y, qr_size);
    Ok(())
}

/// Render front pages for every ticket, then the back pages.
pub(super) fn render(range: &TicketRange, options: &SheetOptions) -> Result<Vec<u8>, SheetError> {
    let tickets: Vec<TicketNumber> = range.iter().collect();
    let (doc, first_page, first_layer) = PdfDocument::new(
        &options.title,
        mm(PAGE_WIDTH),
        mm(PAGE_HEIGHT),
        LAYER,
    );
    let fonts = Fonts::load(&doc, options)?;
    let black = Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None));

    let mut first = Some((first_page, first_layer));
    for side in [Side::Front, Side::Back] {
        for chunk in tickets.chunks(CELLS_PER_PAGE as usize) {
            let (page, layer) = first
                .take()
                .unwrap_or_else(|| doc.add_page(mm(PAGE_WIDTH), mm(PAGE_HEIGHT), LAYER));
            let layer = doc.get_page(page).get_layer(layer);
            layer.set_fill_color(black.clone());

            for (index, ticket) in (0..).zip(chunk) {
                draw_cell(&layer, &fonts, options, side, index, *ticket)?;
            }
        }
    }

    doc.save_to_bytes().map_err(pdf_error)
}

//! PDF export of finished storybooks.
//!
//! A book is laid out as a title sheet followed by one section per page:
//! illustration first, then word-wrapped text. Sections that are taller than a
//! sheet continue on the next one. Everything is drawn with the standard
//! Helvetica faces, so no font files are embedded.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Pure byte-in, byte-out: callers fetch assets and hand
//! them over in a [`BookExport`].

use storybook::{Book, BrandSettings, Page};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub mod layout;
pub mod pdf;
pub mod text;

pub use layout::SheetSize;

use layout::{fit_image, paginate, Block};
use pdf::{prepare_image, Footer, Geometry, PreparedImage};
use text::{wrap_text, Face};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdf encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to write pdf: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid render options: {0}")]
    InvalidOptions(String),
}

/// A page together with its downloaded illustration.
#[derive(Debug, Clone)]
pub struct ExportPage {
    pub page: Page,
    pub illustration: Option<Vec<u8>>,
}

/// Everything needed to render one book.
#[derive(Debug, Clone)]
pub struct BookExport {
    pub book: Book,
    pub pages: Vec<ExportPage>,
    /// Brand logo bytes, drawn on the title sheet.
    pub logo: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub sheet: SheetSize,
    /// Margin on every side, in points.
    pub margin: f32,
    pub body_font_size: f32,
    pub title_font_size: f32,
    pub brand: Option<BrandSettings>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sheet: SheetSize::A4,
            margin: 48.0,
            body_font_size: 14.0,
            title_font_size: 28.0,
            brand: None,
        }
    }
}

impl RenderOptions {
    /// Rejects margins and font sizes that leave no room to lay out a book.
    pub fn check(&self) -> Result<(), RenderError> {
        self.validate().map(|_| ())
    }

    fn validate(&self) -> Result<Geometry, RenderError> {
        let (width, height) = self.sheet.dimensions();
        if !(self.margin >= 0.0 && self.margin * 2.0 < width.min(height) - 72.0) {
            return Err(RenderError::InvalidOptions(format!(
                "margin {} leaves no room for content",
                self.margin
            )));
        }
        for (name, size) in [
            ("body_font_size", self.body_font_size),
            ("title_font_size", self.title_font_size),
        ] {
            if !(4.0..=96.0).contains(&size) {
                return Err(RenderError::InvalidOptions(format!(
                    "{name} must be between 4 and 96 points"
                )));
            }
        }
        Ok(Geometry {
            width,
            height,
            margin: self.margin,
        })
    }

    fn brand_name(&self) -> Option<&str> {
        self.brand
            .as_ref()
            .and_then(|b| b.brand_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    fn accent(&self) -> Option<(u8, u8, u8)> {
        self.brand
            .as_ref()
            .and_then(|b| b.primary_color)
            .map(|c| c.rgb())
    }
}

/// Decodes every illustration once. Slot `i` holds page `i`'s illustration;
/// the final slot holds the logo.
fn prepare_images(export: &BookExport) -> Vec<Option<PreparedImage>> {
    let decode = |bytes: &Option<Vec<u8>>, what: String| {
        let bytes = bytes.as_ref()?;
        match prepare_image(bytes) {
            Ok(image) => Some(image),
            Err(error) => {
                warn!(%error, image = %what, "skipping undecodable image");
                None
            }
        }
    };

    let mut images: Vec<Option<PreparedImage>> = export
        .pages
        .iter()
        .map(|p| decode(&p.illustration, format!("page {}", p.page.number)))
        .collect();
    images.push(decode(&export.logo, "logo".to_string()));
    images
}

fn image_block(
    images: &[Option<PreparedImage>],
    index: usize,
    max_w: f32,
    max_h: f32,
) -> Option<Block> {
    let image = images.get(index)?.as_ref()?;
    let (width, height) = fit_image(image.px_width, image.px_height, max_w, max_h);
    (width > 0.0 && height > 0.0).then_some(Block::Image {
        index,
        width,
        height,
    })
}

fn lines(
    text: &str,
    size: f32,
    face: Face,
    color: Option<(u8, u8, u8)>,
    centered: bool,
    max_width: f32,
) -> impl Iterator<Item = Block> {
    wrap_text(text, size, face, max_width)
        .into_iter()
        .map(move |text| Block::Line {
            text,
            size,
            face,
            color,
            centered,
        })
}

/// Builds the block stream for the whole book.
fn compose(
    export: &BookExport,
    options: &RenderOptions,
    geometry: Geometry,
    images: &[Option<PreparedImage>],
) -> Vec<Block> {
    let width = geometry.content_width();
    let height = geometry.content_height();
    let accent = options.accent();
    let logo_index = export.pages.len();
    let mut blocks = Vec::new();

    // Title sheet.
    blocks.extend(lines(
        &export.book.title,
        options.title_font_size,
        Face::Bold,
        accent,
        true,
        width,
    ));
    blocks.push(Block::Gap(options.body_font_size));
    blocks.extend(lines(
        &format!("A story about {}", export.book.parameters.character),
        options.body_font_size,
        Face::Regular,
        None,
        true,
        width,
    ));
    blocks.push(Block::Gap(options.body_font_size * 2.0));
    // The first page's illustration doubles as the cover.
    if let Some(cover) = image_block(images, 0, width, height * 0.45) {
        blocks.push(cover);
        blocks.push(Block::Gap(options.body_font_size * 2.0));
    }
    if let Some(logo) = image_block(images, logo_index, 120.0, 60.0) {
        blocks.push(logo);
        blocks.push(Block::Gap(options.body_font_size * 0.5));
    }
    if let Some(brand) = options.brand_name() {
        blocks.extend(lines(
            brand,
            options.body_font_size,
            Face::Bold,
            accent,
            true,
            width,
        ));
    }

    for (index, entry) in export.pages.iter().enumerate() {
        blocks.push(Block::SheetBreak);
        if let Some(illustration) = image_block(images, index, width, height * 0.5) {
            blocks.push(illustration);
            blocks.push(Block::Gap(options.body_font_size * 1.5));
        }
        blocks.extend(lines(
            &entry.page.text,
            options.body_font_size,
            Face::Regular,
            None,
            false,
            width,
        ));
    }

    blocks
}

/// Renders `export` as a PDF document.
#[instrument(skip_all, fields(book = %export.book.id, pages = export.pages.len()))]
pub fn render_pdf(export: &BookExport, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
    let geometry = options.validate()?;
    let images = prepare_images(export);
    let blocks = compose(export, options, geometry, &images);
    let sheets = paginate(blocks, geometry.content_height());
    debug!(sheets = sheets.len(), "laid out book");

    let footer = Footer {
        brand_name: options.brand_name(),
    };
    pdf::write_document(&export.book.title, &sheets, &images, geometry, &footer)
}

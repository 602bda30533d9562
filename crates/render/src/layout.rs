//! Sheet geometry and the flow of content blocks onto sheets.
//!
//! Coordinates here are measured in points from the top-left corner of the
//! content area; the PDF writer flips them into PDF user space.

use crate::text::Face;

/// Physical sheet size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetSize {
    #[default]
    A4,
    Letter,
}

impl SheetSize {
    /// Width and height in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            Self::A4 => (595.0, 842.0),
            Self::Letter => (612.0, 792.0),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "letter" => Some(Self::Letter),
            _ => None,
        }
    }
}

/// A unit of content placed on a sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Illustration `index` scaled to `width` x `height`, centred horizontally.
    Image {
        index: usize,
        width: f32,
        height: f32,
    },
    /// One line of text.
    Line {
        text: String,
        size: f32,
        face: Face,
        /// Accent colour; `None` is black.
        color: Option<(u8, u8, u8)>,
        centered: bool,
    },
    /// Vertical whitespace. Dropped at the top of a sheet.
    Gap(f32),
    /// Forces the next block onto a fresh sheet.
    SheetBreak,
}

/// Multiplier from font size to line height.
pub const LEADING: f32 = 1.4;

impl Block {
    pub fn height(&self) -> f32 {
        match self {
            Self::Image { height, .. } => *height,
            Self::Line { size, .. } => size * LEADING,
            Self::Gap(h) => *h,
            Self::SheetBreak => 0.0,
        }
    }
}

/// A block with its vertical offset from the top of the content area.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub block: Block,
    pub top: f32,
}

/// Flows `blocks` onto sheets whose content area is `content_height` tall.
///
/// A block that does not fit in the remaining space starts a new sheet. A
/// block taller than a whole sheet is placed alone on its own sheet (callers
/// scale images to avoid this). Empty sheets are never produced.
pub fn paginate(blocks: Vec<Block>, content_height: f32) -> Vec<Vec<Placed>> {
    let mut sheets: Vec<Vec<Placed>> = Vec::new();
    let mut current: Vec<Placed> = Vec::new();
    let mut cursor = 0.0_f32;

    for block in blocks {
        match block {
            Block::SheetBreak => {
                if !current.is_empty() {
                    sheets.push(std::mem::take(&mut current));
                }
                cursor = 0.0;
            }
            Block::Gap(_) if current.is_empty() => {}
            block => {
                let height = block.height();
                if cursor + height > content_height && !current.is_empty() {
                    sheets.push(std::mem::take(&mut current));
                    cursor = 0.0;
                    if matches!(block, Block::Gap(_)) {
                        continue;
                    }
                }
                current.push(Placed { block, top: cursor });
                cursor += height;
            }
        }
    }
    if !current.is_empty() {
        sheets.push(current);
    }
    sheets
}

/// Scales an image of `px_width` x `px_height` pixels to fit inside
/// `max_width` x `max_height` points, preserving its aspect ratio.
pub fn fit_image(px_width: u32, px_height: u32, max_width: f32, max_height: f32) -> (f32, f32) {
    if px_width == 0 || px_height == 0 {
        return (0.0, 0.0);
    }
    let (w, h) = (px_width as f32, px_height as f32);
    let scale = (max_width / w).min(max_height / h);
    (w * scale, h * scale)
}

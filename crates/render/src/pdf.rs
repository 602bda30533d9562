//! PDF document assembly.

use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, Stream,
};

use crate::{
    layout::{Block, Placed},
    text::{encode_win_ansi, text_width, Face},
    RenderError,
};

/// An illustration re-encoded as baseline JPEG, ready for a DCTDecode XObject.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Vec<u8>,
    pub px_width: u32,
    pub px_height: u32,
}

/// Decodes any supported image and re-encodes it as RGB JPEG.
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (px_width, px_height) = rgb.dimensions();
    let mut jpeg = Vec::new();
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)?;
    Ok(PreparedImage {
        jpeg,
        px_width,
        px_height,
    })
}

/// Text drawn at the bottom of every sheet, next to its 1-based number.
pub struct Footer<'a> {
    pub brand_name: Option<&'a str>,
}

/// Fixed sheet geometry shared by every sheet of a document.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Geometry {
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// Content height, leaving room for the footer inside the bottom margin.
    pub fn content_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }
}

fn image_name(index: usize) -> String {
    format!("Im{index}")
}

fn color_operands(rgb: (u8, u8, u8)) -> Vec<Object> {
    let (r, g, b) = rgb;
    vec![
        (f32::from(r) / 255.0).into(),
        (f32::from(g) / 255.0).into(),
        (f32::from(b) / 255.0).into(),
    ]
}

fn text_ops(ops: &mut Vec<Operation>, text: &str, face: Face, size: f32, x: f32, y: f32) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![face.resource().into(), size.into()]));
    ops.push(Operation::new("Td", vec![x.into(), y.into()]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::string_literal(encode_win_ansi(text))],
    ));
    ops.push(Operation::new("ET", vec![]));
}

/// Content stream operations for one sheet.
fn sheet_operations(
    placed: &[Placed],
    geometry: Geometry,
    number: usize,
    footer: &Footer<'_>,
) -> Vec<Operation> {
    let mut ops = Vec::new();
    let top = geometry.height - geometry.margin;

    for item in placed {
        match &item.block {
            Block::Image {
                index,
                width,
                height,
            } => {
                let x = geometry.margin + (geometry.content_width() - width) / 2.0;
                let y = top - item.top - height;
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        (*width).into(),
                        0.into(),
                        0.into(),
                        (*height).into(),
                        x.into(),
                        y.into(),
                    ],
                ));
                ops.push(Operation::new("Do", vec![image_name(*index).as_str().into()]));
                ops.push(Operation::new("Q", vec![]));
            }
            Block::Line {
                text,
                size,
                face,
                color,
                centered,
            } => {
                if text.is_empty() {
                    continue;
                }
                let x = if *centered {
                    geometry.margin + (geometry.content_width() - text_width(text, *size, *face)) / 2.0
                } else {
                    geometry.margin
                };
                // Baseline sits roughly one font size below the line top.
                let y = top - item.top - size;
                ops.push(Operation::new("rg", color_operands(color.unwrap_or((0, 0, 0)))));
                text_ops(&mut ops, text, *face, *size, x, y);
            }
            Block::Gap(_) | Block::SheetBreak => {}
        }
    }

    let footer_size = 9.0;
    let footer_y = geometry.margin / 2.0;
    ops.push(Operation::new("rg", color_operands((110, 110, 110))));
    let label = number.to_string();
    let x = (geometry.width - text_width(&label, footer_size, Face::Regular)) / 2.0;
    text_ops(&mut ops, &label, Face::Regular, footer_size, x, footer_y);
    if let Some(brand) = footer.brand_name {
        text_ops(
            &mut ops,
            brand,
            Face::Regular,
            footer_size,
            geometry.margin,
            footer_y,
        );
    }
    ops
}

/// Writes `sheets` as a PDF document.
pub fn write_document(
    title: &str,
    sheets: &[Vec<Placed>],
    images: &[Option<PreparedImage>],
    geometry: Geometry,
    footer: &Footer<'_>,
) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for face in [Face::Regular, Face::Bold] {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource(), font_id);
    }

    let mut xobjects = Dictionary::new();
    for (index, image) in images.iter().enumerate() {
        let Some(image) = image else { continue };
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.px_width),
                "Height" => i64::from(image.px_height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.jpeg.clone(),
        )
        .with_compression(false);
        let image_id = doc.add_object(stream);
        xobjects.set(image_name(index), image_id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(sheets.len());
    for (i, placed) in sheets.iter().enumerate() {
        let content = Content {
            operations: sheet_operations(placed, geometry, i + 1, footer),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => sheets.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), geometry.width.into(), geometry.height.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(encode_win_ansi(title)),
        "Producer" => Object::string_literal("storybook"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

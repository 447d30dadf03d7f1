use std::collections::{BTreeMap, HashMap};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::Submission;
use crate::signature;

const FONT_RESOURCE: &str = "CfHelv";
const SIGNATURE_RESOURCE: &str = "CfSig";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn first_page() -> u32 {
    1
}

fn default_font_size() -> i64 {
    12
}

/// A line of text drawn at a fixed point. `text` may reference submission
/// values as `{student_name}`, `{grade}`, `{parent_name}`, `{wa_number}`,
/// `{email}`, `{timestamp}` and `{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPlacement {
    #[serde(default = "first_page")]
    pub page: u32,
    pub x: i64,
    pub y: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePlacement {
    #[serde(default = "first_page")]
    pub page: u32,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Positions are PDF points from the bottom-left corner of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLayout {
    #[serde(default = "default_font_size")]
    pub font_size: i64,
    pub text: Vec<TextPlacement>,
    #[serde(default)]
    pub signature: Option<ImagePlacement>,
}

impl TemplateLayout {
    /// The layout of the printed confirmation form.
    pub fn confirmation_form() -> Self {
        let line = |y: i64, text: &str| TextPlacement {
            page: 1,
            x: 100,
            y,
            text: text.to_string(),
        };

        Self {
            font_size: default_font_size(),
            text: vec![
                line(675, "Menyatakan dengan ini bahwa:"),
                line(650, "Nama Peserta Didik           : {student_name}"),
                line(625, "Kelas                                  : {grade}"),
                line(600, "Nama Orang Tua               : {parent_name}"),
                line(575, "WA aktif Orang Tua/Wali   : {wa_number}"),
                line(550, "Email aktif Orang Tua/Wali: {email}"),
                line(525, "Timestamp: {timestamp}"),
                line(500, "Demikian konfirmasi dari kami. Terima Kasih."),
                line(475, "Hormat Kami,"),
                line(350, "Orang Tua/Wali"),
            ],
            signature: Some(ImagePlacement {
                page: 1,
                x: 100,
                y: 400,
                width: 200,
                height: 50,
            }),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Cannot read layout {}: {}", path.display(), e))
        })?;
        let layout: TemplateLayout = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("Invalid layout {}: {}", path.display(), e))
        })?;
        layout.check()?;
        Ok(layout)
    }

    fn check(&self) -> Result<(), AppError> {
        let pages = self
            .text
            .iter()
            .map(|t| t.page)
            .chain(self.signature.iter().map(|s| s.page));

        for page in pages {
            if page == 0 {
                return Err(AppError::Config(
                    "Layout pages are numbered from 1".to_string(),
                ));
            }
        }

        if self.font_size <= 0 {
            return Err(AppError::Config("Layout font size must be positive".to_string()));
        }

        Ok(())
    }
}

#[derive(Default)]
struct PageOverlay {
    lines: Vec<(i64, i64, String)>,
    signature: Option<ImagePlacement>,
}

/// Stamps submissions onto a PDF template.
#[derive(Debug, Clone)]
pub struct DocumentComposer {
    template_path: PathBuf,
    layout: TemplateLayout,
    display_offset: FixedOffset,
}

impl DocumentComposer {
    pub fn new(template_path: PathBuf, layout: TemplateLayout, display_offset: FixedOffset) -> Self {
        Self {
            template_path,
            layout,
            display_offset,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let layout = match &config.template_layout_path {
            Some(path) => TemplateLayout::from_json_file(path)?,
            None => TemplateLayout::confirmation_form(),
        };

        Ok(Self::new(
            config.template_path.clone(),
            layout,
            config.display_offset,
        ))
    }

    /// Every page of the template is kept; only the pages named by the
    /// layout receive an overlay.
    #[instrument(skip_all, fields(submission_id = submission.id))]
    pub fn compose(&self, submission: &Submission) -> Result<Vec<u8>, AppError> {
        let template = std::fs::read(&self.template_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                AppError::TemplateMissing(self.template_path.display().to_string())
            }
            _ => AppError::Compose(format!(
                "Cannot read template {}: {}",
                self.template_path.display(),
                e
            )),
        })?;

        let mut doc = Document::load_mem(&template)?;
        let pages = doc.get_pages();
        debug!(pages = pages.len(), "Loaded template");

        let values = self.placeholder_values(submission);
        let mut overlays: BTreeMap<u32, PageOverlay> = BTreeMap::new();

        for placement in &self.layout.text {
            overlays.entry(placement.page).or_default().lines.push((
                placement.x,
                placement.y,
                render_placeholders(&placement.text, &values),
            ));
        }

        let signature_image = match (&submission.signature, &self.layout.signature) {
            (Some(png), Some(placement)) => {
                let image = signature::decode(png)
                    .map_err(|e| AppError::Compose(format!("Stored signature unreadable: {}", e)))?;
                overlays.entry(placement.page).or_default().signature = Some(placement.clone());
                Some(image)
            }
            _ => None,
        };

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let signature_id = match &signature_image {
            Some(image) => Some(add_image_xobject(&mut doc, image)?),
            None => None,
        };

        for (page_number, overlay) in &overlays {
            let page_id = *pages.get(page_number).ok_or_else(|| {
                AppError::Compose(format!(
                    "Layout references page {} but the template has {} page(s)",
                    page_number,
                    pages.len()
                ))
            })?;

            stamp_page(
                &mut doc,
                page_id,
                overlay,
                self.layout.font_size,
                font_id,
                signature_id,
            )?;
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| AppError::Compose(format!("Cannot write document: {}", e)))?;

        info!(bytes = output.len(), "Composed confirmation document");
        Ok(output)
    }

    fn placeholder_values(&self, submission: &Submission) -> HashMap<&'static str, String> {
        let fields = &submission.fields;
        let timestamp = submission
            .created_at
            .with_timezone(&self.display_offset)
            .format(TIMESTAMP_FORMAT)
            .to_string();

        HashMap::from([
            ("id", submission.id.to_string()),
            ("grade", fields.grade.to_string()),
            ("student_name", fields.student_name.clone()),
            ("parent_name", fields.parent_name.clone()),
            ("wa_number", fields.wa_number.clone()),
            ("email", fields.email.clone()),
            ("timestamp", timestamp),
        ])
    }
}

/// Single pass, so values containing braces are never expanded again.
/// Unknown placeholders are left as written.
pub fn render_placeholders(template: &str, values: &HashMap<&'static str, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        match after.find('}').and_then(|end| values.get(&after[..end]).map(|v| (end, v))) {
            Some((end, value)) => {
                rendered.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Standard 14 fonts only cover single-byte encodings.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

fn add_image_xobject(doc: &mut Document, image: &RgbaImage) -> Result<ObjectId, AppError> {
    let (width, height) = image.dimensions();

    let pixels = image.as_raw().len() / 4;
    let mut alpha_buf = Vec::with_capacity(pixels);
    let mut rgb_buf = Vec::with_capacity(pixels * 3);

    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb_buf.extend_from_slice(&[r, g, b]);
        alpha_buf.push(a);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha_buf)?,
    ));

    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => Object::Reference(smask_id),
        },
        deflate(&rgb_buf)?,
    )))
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| AppError::Compose(format!("Cannot compress image: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| AppError::Compose(format!("Cannot compress image: {}", e)))
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    overlay: &PageOverlay,
    font_size: i64,
    font_id: ObjectId,
    signature_id: Option<ObjectId>,
) -> Result<(), AppError> {
    let mut resources = inherited_resources(doc, page_id)?;

    let mut fonts = resource_category(doc, &resources, b"Font")?;
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let signature = match (&overlay.signature, signature_id) {
        (Some(placement), Some(xobject_id)) => {
            let mut xobjects = resource_category(doc, &resources, b"XObject")?;
            xobjects.set(SIGNATURE_RESOURCE, Object::Reference(xobject_id));
            resources.set("XObject", Object::Dictionary(xobjects));
            Some(placement)
        }
        _ => None,
    };

    // The template's own content runs inside q/Q so its graphics state
    // cannot leak into the overlay.
    let mut operations = vec![Operation::new("Q", vec![])];

    for (x, y, text) in &overlay.lines {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                    Object::Integer(font_size),
                ],
            ),
            Operation::new("Td", vec![Object::Integer(*x), Object::Integer(*y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    if let Some(placement) = signature {
        operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(placement.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(placement.height),
                    Object::Integer(placement.x),
                    Object::Integer(placement.y),
                ],
            ),
            Operation::new(
                "Do",
                vec![Object::Name(SIGNATURE_RESOURCE.as_bytes().to_vec())],
            ),
            Operation::new("Q", vec![]),
        ]);
    }

    let overlay_bytes = Content { operations }
        .encode()
        .map_err(|e| AppError::Compose(format!("Cannot encode overlay: {}", e)))?;

    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay_bytes));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));

    let mut contents = vec![Object::Reference(prefix_id)];
    match page.remove(b"Contents") {
        Some(Object::Reference(existing)) => contents.push(Object::Reference(existing)),
        Some(Object::Array(existing)) => contents.extend(existing),
        _ => {}
    }
    contents.push(Object::Reference(overlay_id));
    page.set("Contents", Object::Array(contents));

    Ok(())
}

/// Resources may sit on the page or on any ancestor in the page tree.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, AppError> {
    let mut node = doc.get_dictionary(page_id)?;

    loop {
        match node.get(b"Resources") {
            Ok(Object::Reference(id)) => return Ok(doc.get_dictionary(*id)?.clone()),
            Ok(Object::Dictionary(dict)) => return Ok(dict.clone()),
            _ => {}
        }

        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node = doc.get_dictionary(*parent)?,
            _ => return Ok(Dictionary::new()),
        }
    }
}

fn resource_category(
    doc: &Document,
    resources: &Dictionary,
    key: &[u8],
) -> Result<Dictionary, AppError> {
    match resources.get(key) {
        Ok(Object::Reference(id)) => Ok(doc.get_dictionary(*id)?.clone()),
        Ok(Object::Dictionary(dict)) => Ok(dict.clone()),
        _ => Ok(Dictionary::new()),
    }
}

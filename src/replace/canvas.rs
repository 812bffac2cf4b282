//! Page-level draw primitives over `lopdf`.
//!
//! Replacement ops are appended to the page's existing content stream: a
//! white filled rectangle (`re`/`f`) followed by a text object drawing the
//! replacement in the embedded Helvetica fallback font. The original text
//! objects stay in the stream underneath the erasure — this is visual
//! replacement, not content-stream editing.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::error::Result;
use crate::geometry::Rect;
use crate::metrics;
use crate::replace::{DrawOp, ReplacementPlan};

/// Resource name the fallback font registers under.
const FONT_RESOURCE: &str = "FRst";

/// Page object ids in document order.
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Append one plan's erase + draw operations to a page.
pub(crate) fn apply_plan(doc: &mut Document, page_id: ObjectId, plan: &ReplacementPlan) -> Result<()> {
    if plan.draw.is_some() {
        ensure_fallback_font(doc, page_id)?;
    }

    let data = doc.get_page_content(page_id)?;
    let mut content = Content::decode(&data)?;
    content.operations.extend(erase_ops(&plan.erase));
    if let Some(draw) = &plan.draw {
        content.operations.extend(draw_ops(draw));
    }
    let encoded = content.encode()?;
    doc.change_page_content(page_id, encoded)?;
    Ok(())
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn erase_ops(rect: &Rect) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
        Operation::new(
            "re",
            vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn draw_ops(draw: &DrawOp) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), real(draw.size)],
        ),
        Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
        Operation::new("Td", vec![real(draw.x), real(draw.y)]),
        Operation::new(
            "Tj",
            vec![Object::String(
                encode_winansi(&draw.text),
                lopdf::StringFormat::Literal,
            )],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Replacement text draws in WinAnsi; characters outside Latin-1 degrade
/// to '?' rather than corrupting the stream.
fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

fn helvetica_dict() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => metrics::FALLBACK_FONT_NAME,
        "Encoding" => "WinAnsiEncoding",
    }
}

enum ResourceSlot {
    Referenced(ObjectId),
    Inline,
    Missing,
}

fn resource_slot(doc: &Document, page_id: ObjectId) -> Result<ResourceSlot> {
    let page = doc.get_dictionary(page_id)?;
    Ok(match page.get(b"Resources") {
        Ok(Object::Reference(id)) => ResourceSlot::Referenced(*id),
        Ok(Object::Dictionary(_)) => ResourceSlot::Inline,
        _ => ResourceSlot::Missing,
    })
}

fn font_registered(doc: &Document, resources: &Dictionary) -> bool {
    match resources.get(b"Font") {
        Ok(Object::Dictionary(fonts)) => fonts.has(FONT_RESOURCE.as_bytes()),
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map(|fonts| fonts.has(FONT_RESOURCE.as_bytes()))
            .unwrap_or(false),
        _ => false,
    }
}

/// Insert the font into a resources dictionary. Returns the Font
/// subdictionary's object id when it lives behind a reference and must be
/// mutated separately.
fn set_font_entry(resources: &mut Dictionary, font_id: ObjectId) -> Option<ObjectId> {
    match resources.get_mut(b"Font") {
        Ok(Object::Dictionary(fonts)) => {
            fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            None
        }
        Ok(Object::Reference(id)) => Some(*id),
        _ => {
            let mut fonts = Dictionary::new();
            fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            resources.set("Font", Object::Dictionary(fonts));
            None
        }
    }
}

/// Register the Helvetica fallback in the page's resources, once.
fn ensure_fallback_font(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let slot = resource_slot(doc, page_id)?;

    let registered = match &slot {
        ResourceSlot::Referenced(id) => doc
            .get_dictionary(*id)
            .map(|res| font_registered(doc, res))
            .unwrap_or(false),
        ResourceSlot::Inline => {
            let page = doc.get_dictionary(page_id)?;
            match page.get(b"Resources") {
                Ok(Object::Dictionary(res)) => font_registered(doc, res),
                _ => false,
            }
        }
        ResourceSlot::Missing => false,
    };
    if registered {
        return Ok(());
    }

    let font_id = doc.add_object(helvetica_dict());

    match slot {
        ResourceSlot::Referenced(id) => {
            let resources = doc.get_object_mut(id)?.as_dict_mut()?;
            if let Some(fonts_id) = set_font_entry(resources, font_id) {
                let fonts = doc.get_object_mut(fonts_id)?.as_dict_mut()?;
                fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            }
        }
        ResourceSlot::Inline => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            let deferred = match page.get_mut(b"Resources") {
                Ok(Object::Dictionary(resources)) => set_font_entry(resources, font_id),
                _ => None,
            };
            if let Some(fonts_id) = deferred {
                let fonts = doc.get_object_mut(fonts_id)?.as_dict_mut()?;
                fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            }
        }
        ResourceSlot::Missing => {
            let mut fonts = Dictionary::new();
            fonts.set(FONT_RESOURCE, Object::Reference(font_id));
            let mut resources = Dictionary::new();
            resources.set("Font", Object::Dictionary(fonts));
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Resources", Object::Dictionary(resources));
        }
    }
    Ok(())
}

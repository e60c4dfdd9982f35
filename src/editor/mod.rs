//! Editable image grid for the admin work editor.
//!
//! Images are kept in display order and every reorder renumbers positions
//! `0..n`, so an image's index doubles as its position while editing.

use serde_json::{Map, Value};

use crate::layout::compute_layout;
use crate::models::{
    GridRow, ImageDescriptor, ImageKey, ImageSize, Transformations, WorkImageRecord,
    DEFAULT_SIZE_PERCENT,
};
use crate::render::{render_rows, EditorCell, EditorDecorator, RenderPlan};

pub const MIN_SIZE_PERCENT: u32 = 50;
pub const MAX_SIZE_PERCENT: u32 = 150;

/// Raw bytes of an image picked for upload but not stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PendingUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditableImage {
    /// Persisted id, `None` until saved.
    pub id: Option<i64>,
    pub upload: Option<PendingUpload>,
    pub image_url: Option<String>,
    pub position: i64,
    /// Zoom width in percent; drives layout and rendering.
    pub size_percent: u32,
    /// Stored zoom height, carried through unchanged until the next resize.
    pub size_height: u32,
    pub is_full_width: bool,
    pub row_span: u32,
    pub rotation: i32,
    pub caption: String,
    pub alt_text: String,
    /// Transformation keys this editor does not manage.
    pub extra: Map<String, Value>,
}

impl EditableImage {
    pub fn from_record(record: &WorkImageRecord) -> Self {
        let transformations = Transformations::from_value(record.transformations.as_ref());
        Self {
            id: Some(record.id),
            upload: None,
            image_url: Some(record.image_url.clone()),
            position: record.position.unwrap_or(0),
            size_percent: transformations.size.width,
            size_height: transformations.size.height,
            is_full_width: transformations.is_full_width,
            row_span: transformations.span_rows.clamp(1, i64::from(u32::MAX)) as u32,
            rotation: transformations.rotation,
            caption: record.caption.clone().unwrap_or_default(),
            alt_text: record.alt_text.clone().unwrap_or_default(),
            extra: transformations.extra,
        }
    }

    pub fn from_upload(upload: PendingUpload, position: i64) -> Self {
        Self {
            id: None,
            upload: Some(upload),
            image_url: None,
            position,
            size_percent: DEFAULT_SIZE_PERCENT,
            size_height: DEFAULT_SIZE_PERCENT,
            is_full_width: false,
            row_span: 1,
            rotation: 0,
            caption: String::new(),
            alt_text: String::new(),
            extra: Map::new(),
        }
    }

    pub fn descriptor(&self, index: usize) -> ImageDescriptor {
        ImageDescriptor {
            key: self.id.map(ImageKey::Id).unwrap_or(ImageKey::Unsaved(index)),
            position: self.position,
            is_full_width: self.is_full_width,
            row_span: i64::from(self.row_span),
            size_percent: self.size_percent,
            rotation: self.rotation,
        }
    }

    pub fn transformations(&self) -> Transformations {
        Transformations {
            size: ImageSize {
                width: self.size_percent,
                height: self.size_height,
            },
            is_full_width: self.is_full_width,
            span_rows: i64::from(self.row_span),
            rotation: self.rotation,
            extra: self.extra.clone(),
        }
    }

    /// JSON written to the `transformations` column.
    pub fn transformations_value(&self) -> Value {
        self.transformations().to_value()
    }

    /// Caption as stored: empty strings become `NULL`.
    pub fn stored_caption(&self) -> Option<String> {
        Some(self.caption.clone()).filter(|c| !c.is_empty())
    }

    pub fn stored_alt_text(&self) -> Option<String> {
        Some(self.alt_text.clone()).filter(|a| !a.is_empty())
    }

    fn differs_from(&self, other: &Self) -> bool {
        self.position != other.position
            || self.is_full_width != other.is_full_width
            || self.row_span != other.row_span
            || self.size_percent != other.size_percent
            || self.size_height != other.size_height
            || self.rotation != other.rotation
            || self.caption != other.caption
            || self.alt_text != other.alt_text
            || self.extra != other.extra
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

/// What a save has to do to bring the store in line with the editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageChanges {
    pub to_delete: Vec<EditableImage>,
    pub to_add: Vec<EditableImage>,
    pub to_update: Vec<EditableImage>,
}

impl ImageChanges {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty() && self.to_update.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DragState {
    start: Option<usize>,
    over: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ImageEditor {
    images: Vec<EditableImage>,
    selected: Option<usize>,
    drag: DragState,
}

impl ImageEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an editing session from stored records.
    pub fn from_records(records: &[WorkImageRecord]) -> Self {
        let mut images: Vec<EditableImage> = records.iter().map(EditableImage::from_record).collect();
        images.sort_by_key(|img| img.position);
        Self {
            images,
            ..Self::default()
        }
    }

    pub fn images(&self) -> &[EditableImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn has_uploads(&self) -> bool {
        self.images.iter().any(|img| img.upload.is_some())
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        self.selected = Some(index);
        true
    }

    /// Appends new uploads with default layout flags.
    pub fn add_uploads(&mut self, uploads: impl IntoIterator<Item = PendingUpload>) {
        let base = self.images.len();
        for (offset, upload) in uploads.into_iter().enumerate() {
            self.images
                .push(EditableImage::from_upload(upload, (base + offset) as i64));
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<EditableImage> {
        if index >= self.images.len() {
            return None;
        }
        let removed = self.images.remove(index);
        self.renumber();
        self.cancel_drag();

        self.selected = match self.selected {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Some(removed)
    }

    /// Swaps the image with its neighbour. Moving past either end is a no-op.
    pub fn move_image(&mut self, index: usize, direction: MoveDirection) -> bool {
        if index >= self.images.len() {
            return false;
        }
        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < self.images.len() => index + 1,
            _ => return false,
        };
        self.images.swap(index, target);
        self.renumber();
        self.selected = Some(target);
        true
    }

    pub fn begin_drag(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        self.drag = DragState {
            start: Some(index),
            over: None,
        };
        self.selected = Some(index);
        true
    }

    pub fn drag_over(&mut self, index: usize) {
        if self.drag.start.is_some() && index < self.images.len() {
            self.drag.over = Some(index);
        }
    }

    pub fn cancel_drag(&mut self) {
        self.drag = DragState::default();
    }

    /// Moves the dragged image to `target`, shifting the ones in between.
    pub fn drop_on(&mut self, target: usize) -> bool {
        let start = self.drag.start;
        self.cancel_drag();

        let Some(start) = start else {
            return false;
        };
        if start == target || start >= self.images.len() || target >= self.images.len() {
            return false;
        }

        let moved = self.images.remove(start);
        self.images.insert(target, moved);
        self.renumber();
        self.selected = Some(target);
        true
    }

    /// Changes the zoom by `delta` percent, clamped to 50..=150.
    pub fn resize(&mut self, index: usize, delta: i32) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        let next = (img.size_percent as i64 + i64::from(delta))
            .clamp(i64::from(MIN_SIZE_PERCENT), i64::from(MAX_SIZE_PERCENT));
        img.size_percent = next as u32;
        img.size_height = img.size_percent;
        true
    }

    pub fn rotate(&mut self, index: usize, direction: RotateDirection) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        let step = match direction {
            RotateDirection::Clockwise => 90,
            RotateDirection::CounterClockwise => -90,
        };
        img.rotation = (img.rotation + step).rem_euclid(360);
        true
    }

    pub fn toggle_full_width(&mut self, index: usize) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        img.is_full_width = !img.is_full_width;
        true
    }

    pub fn increase_row_span(&mut self, index: usize) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        img.row_span = img.row_span.saturating_add(1);
        true
    }

    /// Never goes below one row.
    pub fn decrease_row_span(&mut self, index: usize) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        img.row_span = img.row_span.saturating_sub(1).max(1);
        true
    }

    pub fn set_caption(&mut self, index: usize, caption: impl Into<String>) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        img.caption = caption.into();
        true
    }

    pub fn set_alt_text(&mut self, index: usize, alt_text: impl Into<String>) -> bool {
        let Some(img) = self.images.get_mut(index) else {
            return false;
        };
        img.alt_text = alt_text.into();
        true
    }

    pub fn descriptors(&self) -> Vec<ImageDescriptor> {
        self.images
            .iter()
            .enumerate()
            .map(|(idx, img)| img.descriptor(idx))
            .collect()
    }

    pub fn layout(&self) -> Vec<GridRow> {
        compute_layout(&self.descriptors())
    }

    pub fn render(&self) -> RenderPlan<EditorCell> {
        let decorator = EditorDecorator {
            selected: self.selected,
            drag_over: self.drag.over,
            dragging: self.drag.start.is_some(),
        };
        render_rows(&self.layout(), &decorator)
    }

    /// Diffs the current images against the state loaded from the store.
    pub fn changes(&self, original: &[EditableImage]) -> ImageChanges {
        let to_delete = original
            .iter()
            .filter(|orig| {
                orig.id.is_some() && !self.images.iter().any(|img| img.id == orig.id)
            })
            .cloned()
            .collect();

        let to_add = self
            .images
            .iter()
            .filter(|img| img.id.is_none() && img.upload.is_some())
            .cloned()
            .collect();

        let to_update = self
            .images
            .iter()
            .filter(|img| {
                img.id.is_some()
                    && original
                        .iter()
                        .any(|orig| orig.id == img.id && img.differs_from(orig))
            })
            .cloned()
            .collect();

        ImageChanges {
            to_delete,
            to_add,
            to_update,
        }
    }

    fn renumber(&mut self) {
        for (idx, img) in self.images.iter_mut().enumerate() {
            img.position = idx as i64;
        }
    }
}

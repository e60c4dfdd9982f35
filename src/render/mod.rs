//! Render plans for laid-out grid rows.
//!
//! The read-only work viewer and the admin editor consume the same engine
//! output and differ only in the [`CellDecorator`] that attaches per-cell data.

use crate::models::{GridItem, GridRow};

/// Attaches renderer-specific data to each placed image.
pub trait CellDecorator {
    type Attachment;

    fn decorate(&self, item: &GridItem) -> Self::Attachment;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell<A> {
    pub source_index: usize,
    /// 2 for full-width images, 1 otherwise.
    pub column_span: u8,
    /// Zoom factor derived from the size percentage.
    pub scale: f32,
    pub rotation: i32,
    pub attachment: A,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow<A> {
    /// Row height in `rem`; equal to the engine's row height in layout units.
    pub height_rem: u32,
    pub cells: Vec<RenderedCell<A>>,
}

impl<A> RenderedRow<A> {
    pub fn style(&self) -> String {
        format!("height: {}rem", self.height_rem)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan<A> {
    pub rows: Vec<RenderedRow<A>>,
}

impl<A> RenderPlan<A> {
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).sum()
    }
}

pub fn render_rows<D: CellDecorator>(rows: &[GridRow], decorator: &D) -> RenderPlan<D::Attachment> {
    let rows = rows
        .iter()
        .map(|row| RenderedRow {
            height_rem: row.height,
            cells: row
                .items
                .iter()
                .map(|item| RenderedCell {
                    source_index: item.source_index,
                    column_span: if item.is_full_width { 2 } else { 1 },
                    scale: item.size_percent as f32 / 100.0,
                    rotation: item.rotation,
                    attachment: decorator.decorate(item),
                })
                .collect(),
        })
        .collect();

    RenderPlan { rows }
}

/// Public work page: images only carry alt text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerDecorator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerCell {
    pub alt_text: String,
}

impl CellDecorator for ViewerDecorator {
    type Attachment = ViewerCell;

    fn decorate(&self, item: &GridItem) -> ViewerCell {
        ViewerCell {
            alt_text: format!("Project image {}", item.order + 1),
        }
    }
}

/// Admin grid: selection ring, drop target highlight, drag handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditorDecorator {
    pub selected: Option<usize>,
    pub drag_over: Option<usize>,
    pub dragging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorCell {
    pub selected: bool,
    pub drop_target: bool,
    pub draggable: bool,
}

impl CellDecorator for EditorDecorator {
    type Attachment = EditorCell;

    fn decorate(&self, item: &GridItem) -> EditorCell {
        EditorCell {
            selected: self.selected == Some(item.source_index),
            drop_target: self.dragging && self.drag_over == Some(item.source_index),
            draggable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use crate::models::{ImageDescriptor, ImageKey};

    fn sample() -> Vec<GridRow> {
        compute_layout(&[
            ImageDescriptor::new(ImageKey::Id(1), 0).full_width().with_row_span(2),
            ImageDescriptor::new(ImageKey::Id(2), 1).with_size_percent(150),
            ImageDescriptor::new(ImageKey::Id(3), 2),
        ])
    }

    #[test]
    fn test_viewer_plan() {
        let plan = render_rows(&sample(), &ViewerDecorator);
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(plan.cell_count(), 3);
        assert_eq!(plan.rows[0].style(), "height: 24rem");
        assert_eq!(plan.rows[0].cells[0].column_span, 2);
        assert_eq!(plan.rows[1].cells[0].column_span, 1);
        assert!((plan.rows[1].cells[0].scale - 1.5).abs() < f32::EPSILON);
        assert_eq!(plan.rows[1].cells[1].attachment.alt_text, "Project image 3");
    }

    #[test]
    fn test_editor_plan_marks_selection_and_drop_target() {
        let decorator = EditorDecorator {
            selected: Some(1),
            drag_over: Some(2),
            dragging: true,
        };
        let plan = render_rows(&sample(), &decorator);
        let cells: Vec<&RenderedCell<EditorCell>> =
            plan.rows.iter().flat_map(|r| r.cells.iter()).collect();
        assert!(!cells[0].attachment.selected);
        assert!(cells[1].attachment.selected);
        assert!(cells[2].attachment.drop_target);
        assert!(cells.iter().all(|c| c.attachment.draggable));
    }

    #[test]
    fn test_drop_target_needs_active_drag() {
        let decorator = EditorDecorator {
            selected: None,
            drag_over: Some(2),
            dragging: false,
        };
        let plan = render_rows(&sample(), &decorator);
        assert!(plan
            .rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .all(|c| !c.attachment.drop_target));
    }

    #[test]
    fn test_both_renderers_share_geometry() {
        let rows = sample();
        let viewer = render_rows(&rows, &ViewerDecorator);
        let editor = render_rows(&rows, &EditorDecorator::default());
        for (v, e) in viewer.rows.iter().zip(editor.rows.iter()) {
            assert_eq!(v.height_rem, e.height_rem);
            let v_idx: Vec<usize> = v.cells.iter().map(|c| c.source_index).collect();
            let e_idx: Vec<usize> = e.cells.iter().map(|c| c.source_index).collect();
            assert_eq!(v_idx, e_idx);
        }
    }
}

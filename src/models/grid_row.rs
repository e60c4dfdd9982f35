use crate::models::ImageKey;

#[derive(Debug, Clone, PartialEq)]
pub struct GridItem {
    pub key: ImageKey,
    /// Index into the slice handed to the layout engine.
    pub source_index: usize,
    /// Rank after sorting by position.
    pub order: usize,
    pub is_full_width: bool,
    pub row_span: u32,
    pub size_percent: u32,
    pub rotation: i32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub row_index: u32,
    pub height: u32,
    pub items: Vec<GridItem>,
}

impl GridRow {
    pub fn new(row_index: u32, height: u32, items: Vec<GridItem>) -> Self {
        Self {
            row_index,
            height,
            items,
        }
    }

    pub fn is_full_width(&self) -> bool {
        self.items.iter().any(|item| item.is_full_width)
    }
}

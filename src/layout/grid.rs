use crate::models::{GridItem, GridRow, ImageDescriptor};

/// Height of one row span in layout units. The renderer emits rows in `rem`
/// using the same number, so both sides must agree on it.
pub const UNIT_HEIGHT: u32 = 12;

/// Maximum number of half-width images sharing a row.
const ROW_CAPACITY: usize = 2;

/// Configuration for the two-column row packing layout.
///
/// Half-width images pair up left-to-right; full-width images always take a
/// row of their own. Row height follows the tallest row span in the row.
#[derive(Debug, Clone)]
pub struct GridLayout {
    /// Height of a single row span (default: 12)
    pub unit_height: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            unit_height: UNIT_HEIGHT,
        }
    }
}

impl GridLayout {
    pub fn new(unit_height: u32) -> Self {
        Self { unit_height }
    }

    fn item_height(&self, image: &ImageDescriptor) -> u32 {
        image.effective_row_span().saturating_mul(self.unit_height)
    }

    /// Packs `images` into display rows.
    ///
    /// # Algorithm
    /// 1. Stable sort by `position`; ties keep input order.
    /// 2. A full-width image closes the pending row and is emitted alone.
    /// 3. Half-width images accumulate until the row holds two.
    /// 4. A leftover half-width image becomes the final row.
    ///
    /// Total over its input: malformed flags degrade per
    /// [`ImageDescriptor::effective_row_span`], nothing is rejected.
    pub fn compute(&self, images: &[ImageDescriptor]) -> Vec<GridRow> {
        if images.is_empty() {
            return Vec::new();
        }

        let mut sorted: Vec<usize> = (0..images.len()).collect();
        sorted.sort_by_key(|&idx| images[idx].position);

        let mut rows = Vec::new();
        let mut pending: Vec<GridItem> = Vec::with_capacity(ROW_CAPACITY);
        let mut pending_height = 0u32;

        for (order, &source_index) in sorted.iter().enumerate() {
            let image = &images[source_index];
            let item = GridItem {
                key: image.key.clone(),
                source_index,
                order,
                is_full_width: image.is_full_width,
                row_span: image.effective_row_span(),
                size_percent: image.size_percent,
                rotation: image.rotation,
                height: self.item_height(image),
            };

            if item.is_full_width {
                if !pending.is_empty() {
                    let row_index = rows.len() as u32;
                    rows.push(GridRow::new(
                        row_index,
                        pending_height,
                        std::mem::take(&mut pending),
                    ));
                    pending_height = 0;
                }
                let row_index = rows.len() as u32;
                rows.push(GridRow::new(row_index, item.height, vec![item]));
                continue;
            }

            pending_height = pending_height.max(item.height);
            pending.push(item);
            if pending.len() == ROW_CAPACITY {
                let row_index = rows.len() as u32;
                rows.push(GridRow::new(
                    row_index,
                    pending_height,
                    std::mem::take(&mut pending),
                ));
                pending_height = 0;
            }
        }

        if !pending.is_empty() {
            let row_index = rows.len() as u32;
            rows.push(GridRow::new(row_index, pending_height, pending));
        }

        rows
    }
}

/// Lays out `images` with the default unit height.
pub fn compute_layout(images: &[ImageDescriptor]) -> Vec<GridRow> {
    GridLayout::default().compute(images)
}

/// Calculates the total height of all rows.
/// Useful for scroll calculations.
pub fn total_height(rows: &[GridRow], row_gap: u32) -> u32 {
    if rows.is_empty() {
        return 0;
    }

    let heights_sum = rows.iter().fold(0u32, |acc, r| acc.saturating_add(r.height));
    let gaps_sum = ((rows.len() - 1) as u32).saturating_mul(row_gap);
    heights_sum.saturating_add(gaps_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageKey;

    fn half(pos: i64, span: i64) -> ImageDescriptor {
        ImageDescriptor::new(ImageKey::Id(pos), pos).with_row_span(span)
    }

    fn full(pos: i64, span: i64) -> ImageDescriptor {
        half(pos, span).full_width()
    }

    fn keys(row: &GridRow) -> Vec<ImageKey> {
        row.items.iter().map(|i| i.key.clone()).collect()
    }

    #[test]
    fn test_empty_images() {
        assert!(compute_layout(&[]).is_empty());
    }

    #[test]
    fn test_two_half_width_share_a_row() {
        let rows = compute_layout(&[half(0, 1), half(1, 1)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].items.len(), 2);
        assert_eq!(rows[0].height, 12);
    }

    #[test]
    fn test_full_width_alone() {
        let rows = compute_layout(&[full(0, 2)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].items.len(), 1);
        assert_eq!(rows[0].height, 24);
        assert!(rows[0].is_full_width());
    }

    #[test]
    fn test_full_width_closes_pending_row() {
        let rows = compute_layout(&[half(0, 1), full(1, 1), half(2, 1)]);
        assert_eq!(rows.len(), 3);
        assert_eq!(keys(&rows[0]), vec![ImageKey::Id(0)]);
        assert_eq!(keys(&rows[1]), vec![ImageKey::Id(1)]);
        assert_eq!(keys(&rows[2]), vec![ImageKey::Id(2)]);
        assert!(rows.iter().all(|r| r.height == 12));
    }

    #[test]
    fn test_row_height_is_tallest_span() {
        let rows = compute_layout(&[half(0, 1), half(1, 3), half(2, 1)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].height, 36);
        assert_eq!(rows[0].items.len(), 2);
        assert_eq!(rows[1].height, 12);
        assert_eq!(keys(&rows[1]), vec![ImageKey::Id(2)]);
    }

    #[test]
    fn test_sorted_by_position() {
        let images = vec![
            ImageDescriptor::new(ImageKey::Name("late".into()), 5),
            ImageDescriptor::new(ImageKey::Name("early".into()), 1),
        ];
        let rows = compute_layout(&images);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].items[0].key, ImageKey::Name("early".into()));
        assert_eq!(rows[0].items[0].source_index, 1);
        assert_eq!(rows[0].items[0].order, 0);
        assert_eq!(rows[0].items[1].source_index, 0);
    }

    #[test]
    fn test_equal_positions_keep_input_order() {
        let images = vec![
            ImageDescriptor::new(ImageKey::Unsaved(0), 2),
            ImageDescriptor::new(ImageKey::Unsaved(1), 0),
            ImageDescriptor::new(ImageKey::Unsaved(2), 2),
        ];
        let rows = compute_layout(&images);
        let flat: Vec<usize> = rows
            .iter()
            .flat_map(|r| r.items.iter().map(|i| i.source_index))
            .collect();
        assert_eq!(flat, vec![1, 0, 2]);
    }

    #[test]
    fn test_non_positive_span_treated_as_one() {
        let rows = compute_layout(&[half(0, 0), full(1, -3)]);
        assert_eq!(rows[0].height, 12);
        assert_eq!(rows[0].items[0].row_span, 1);
        assert_eq!(rows[1].height, 12);
    }

    #[test]
    fn test_all_full_width() {
        let images: Vec<ImageDescriptor> = (0..4).map(|i| full(i, 1)).collect();
        let rows = compute_layout(&images);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.items.len() == 1));
    }

    #[test]
    fn test_row_indices_are_sequential() {
        let images: Vec<ImageDescriptor> = (0..7)
            .map(|i| if i % 3 == 0 { full(i, 1) } else { half(i, 1) })
            .collect();
        let rows = compute_layout(&images);
        for (idx, row) in rows.iter().enumerate() {
            assert_eq!(row.row_index as usize, idx);
        }
    }

    #[test]
    fn test_custom_unit_height() {
        let rows = GridLayout::new(10).compute(&[half(0, 2), half(1, 1)]);
        assert_eq!(rows[0].height, 20);
        assert_eq!(rows[0].items[1].height, 10);
    }

    #[test]
    fn test_total_height() {
        let rows = compute_layout(&[full(0, 2), half(1, 1), half(2, 1)]);
        assert_eq!(total_height(&rows, 4), 24 + 12 + 4);
        assert_eq!(total_height(&[], 4), 0);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Row span applied when a record has none (or a non-positive one).
pub const DEFAULT_ROW_SPAN: i64 = 1;

/// Zoom applied when a record carries no size.
pub const DEFAULT_SIZE_PERCENT: u32 = 100;

const KEY_SIZE: &str = "size";
const KEY_FULL_WIDTH: &str = "isFullWidth";
const KEY_SPAN_ROWS: &str = "spanRows";
const KEY_ROTATION: &str = "rotation";

/// Stable identity of an image across layout passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageKey {
    /// Persisted numeric id.
    Id(i64),
    /// Persisted string id.
    Name(String),
    /// Not saved yet; index within the editing session.
    Unsaved(usize),
}

/// Input element of the grid layout engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub key: ImageKey,
    pub position: i64,
    pub is_full_width: bool,
    /// Raw row span as supplied; see [`ImageDescriptor::effective_row_span`].
    pub row_span: i64,
    pub size_percent: u32,
    pub rotation: i32,
}

impl ImageDescriptor {
    pub fn new(key: ImageKey, position: i64) -> Self {
        Self {
            key,
            position,
            is_full_width: false,
            row_span: DEFAULT_ROW_SPAN,
            size_percent: DEFAULT_SIZE_PERCENT,
            rotation: 0,
        }
    }

    pub fn full_width(mut self) -> Self {
        self.is_full_width = true;
        self
    }

    pub fn with_row_span(mut self, row_span: i64) -> Self {
        self.row_span = row_span;
        self
    }

    pub fn with_size_percent(mut self, size_percent: u32) -> Self {
        self.size_percent = size_percent;
        self
    }

    /// Row span used for layout. Values below 1 are clamped to 1.
    pub fn effective_row_span(&self) -> u32 {
        self.row_span.clamp(1, i64::from(u32::MAX)) as u32
    }

    /// Normalizes a stored image record, applying the defaults for anything
    /// absent or malformed.
    pub fn from_record(record: &WorkImageRecord) -> Self {
        let transformations = Transformations::from_value(record.transformations.as_ref());
        Self {
            key: ImageKey::Id(record.id),
            position: record.position.unwrap_or(0),
            is_full_width: transformations.is_full_width,
            row_span: transformations.span_rows,
            size_percent: transformations.size.width,
            rotation: transformations.rotation,
        }
    }
}

/// A `work_images` row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkImageRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub work_id: i64,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub transformations: Option<Value>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
}

/// Width/height zoom in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn uniform(percent: u32) -> Self {
        Self {
            width: percent,
            height: percent,
        }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::uniform(DEFAULT_SIZE_PERCENT)
    }
}

/// Lenient view of the `transformations` JSON object attached to an image.
///
/// Unknown keys survive a read/write cycle in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformations {
    pub size: ImageSize,
    pub is_full_width: bool,
    pub span_rows: i64,
    pub rotation: i32,
    pub extra: Map<String, Value>,
}

impl Default for Transformations {
    fn default() -> Self {
        Self {
            size: ImageSize::default(),
            is_full_width: false,
            span_rows: DEFAULT_ROW_SPAN,
            rotation: 0,
            extra: Map::new(),
        }
    }
}

impl Transformations {
    /// Reads whatever is usable from `value`; never fails.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(obj) = value.and_then(Value::as_object) else {
            return Self::default();
        };

        let size = obj
            .get(KEY_SIZE)
            .and_then(Value::as_object)
            .map(|size| {
                let dim = |key: &str| {
                    size.get(key)
                        .and_then(Value::as_f64)
                        .filter(|v| v.is_finite() && *v > 0.0)
                        .map(|v| v.round() as u32)
                        .unwrap_or(DEFAULT_SIZE_PERCENT)
                };
                ImageSize {
                    width: dim("width"),
                    height: dim("height"),
                }
            })
            .unwrap_or_default();

        let span_rows = obj
            .get(KEY_SPAN_ROWS)
            .and_then(Value::as_i64)
            .filter(|span| *span >= 1)
            .unwrap_or(DEFAULT_ROW_SPAN);

        let extra = obj
            .iter()
            .filter(|(key, _)| {
                !matches!(
                    key.as_str(),
                    KEY_SIZE | KEY_FULL_WIDTH | KEY_SPAN_ROWS | KEY_ROTATION
                )
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            size,
            is_full_width: obj
                .get(KEY_FULL_WIDTH)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            span_rows,
            rotation: obj
                .get(KEY_ROTATION)
                .and_then(Value::as_i64)
                .map(|deg| deg.rem_euclid(360) as i32)
                .unwrap_or(0),
            extra,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = self.extra.clone();
        obj.insert(
            KEY_SIZE.to_string(),
            serde_json::json!({ "width": self.size.width, "height": self.size.height }),
        );
        obj.insert(KEY_FULL_WIDTH.to_string(), Value::Bool(self.is_full_width));
        obj.insert(KEY_SPAN_ROWS.to_string(), Value::from(self.span_rows));
        if self.rotation != 0 {
            obj.insert(KEY_ROTATION.to_string(), Value::from(self.rotation));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(transformations: Option<Value>) -> WorkImageRecord {
        WorkImageRecord {
            id: 9,
            work_id: 1,
            image_url: "/media/works/a.jpg".into(),
            position: Some(3),
            transformations,
            caption: None,
            alt_text: None,
        }
    }

    #[test]
    fn test_missing_transformations_use_defaults() {
        let desc = ImageDescriptor::from_record(&record(None));
        assert_eq!(desc.key, ImageKey::Id(9));
        assert_eq!(desc.position, 3);
        assert!(!desc.is_full_width);
        assert_eq!(desc.row_span, 1);
        assert_eq!(desc.size_percent, 100);
    }

    #[test]
    fn test_reads_nested_flags() {
        let desc = ImageDescriptor::from_record(&record(Some(json!({
            "size": { "width": 120, "height": 120 },
            "isFullWidth": true,
            "spanRows": 3
        }))));
        assert!(desc.is_full_width);
        assert_eq!(desc.row_span, 3);
        assert_eq!(desc.size_percent, 120);
    }

    #[test]
    fn test_malformed_flags_fall_back() {
        let desc = ImageDescriptor::from_record(&record(Some(json!({
            "size": "big",
            "isFullWidth": "yes",
            "spanRows": 0
        }))));
        assert!(!desc.is_full_width);
        assert_eq!(desc.row_span, 1);
        assert_eq!(desc.size_percent, 100);

        let desc = ImageDescriptor::from_record(&record(Some(json!([1, 2]))));
        assert_eq!(desc.row_span, 1);
    }

    #[test]
    fn test_missing_position_is_zero() {
        let mut rec = record(None);
        rec.position = None;
        assert_eq!(ImageDescriptor::from_record(&rec).position, 0);
    }

    #[test]
    fn test_effective_row_span_clamps() {
        let desc = ImageDescriptor::new(ImageKey::Unsaved(0), 0);
        assert_eq!(desc.clone().with_row_span(0).effective_row_span(), 1);
        assert_eq!(desc.clone().with_row_span(-4).effective_row_span(), 1);
        assert_eq!(desc.with_row_span(2).effective_row_span(), 2);
    }

    #[test]
    fn test_extra_keys_survive() {
        let value = json!({ "spanRows": 2, "crop": { "x": 4 } });
        let parsed = Transformations::from_value(Some(&value));
        let written = parsed.to_value();
        assert_eq!(written["crop"], json!({ "x": 4 }));
        assert_eq!(written["spanRows"], json!(2));
        assert_eq!(written["isFullWidth"], json!(false));
        assert_eq!(written["size"], json!({ "width": 100, "height": 100 }));
    }

    #[test]
    fn test_rotation_is_normalized() {
        let parsed = Transformations::from_value(Some(&json!({ "rotation": -90 })));
        assert_eq!(parsed.rotation, 270);
    }
}

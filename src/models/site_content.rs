use serde::{Deserialize, Serialize};

/// A client brand shown in the featured brands carousel when selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub order: i64,
    pub selected: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: i64,
    pub image_path: String,
    pub link: String,
    pub created_at: i64,
}

/// External careers page link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierLink {
    pub id: i64,
    pub url: String,
    pub created_at: i64,
}

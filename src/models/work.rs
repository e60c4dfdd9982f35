use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A portfolio project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Work {
    pub fn slug(&self) -> String {
        slug_from_title(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWork {
    pub title: String,
    pub description: String,
    pub category: String,
    pub cover_image: String,
}

/// Submitted work details before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkForm {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
}

impl WorkForm {
    /// Checks the form the way the admin pages do before uploading anything.
    pub fn validate(&self, has_images: Option<bool>) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("Please enter a project title".into()));
        }
        if has_images == Some(false) {
            return Err(Error::Validation("Please add at least one image".into()));
        }
        if self.category.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(Error::Validation("Please select a category".into()));
        }
        Ok(())
    }

    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
}

pub const CATEGORIES: [Category; 7] = [
    Category {
        name: "Brand Identity Development",
        slug: "brand-identity",
        description: "As branding experts, we create unique identities specific to each Brand's needs enabling them to stand out.",
    },
    Category {
        name: "Web3 Branding & Product Development",
        slug: "web3-branding",
        description: "We help brands thrive in Decentralized Digital Ecosystems, across the spectrum from ideation to implementation.",
    },
    Category {
        name: "UX/UI Design & Website Development",
        slug: "uxui-design",
        description: "We pay keen attention to user experience, this enabling consumers engross in the brand while using its platform.",
    },
    Category {
        name: "Event Branding & Print Logistics",
        slug: "event-branding",
        description: "We offer full-scale Event Branding & Printing Logistics solutions, so your brand would be visible and distinctive at events.",
    },
    Category {
        name: "Merch Design & Packaging",
        slug: "merch-design",
        description: "We turn ideas into tangible products, delivering high-quality merchandise and memorable unboxing experience that reflects your brand identity.",
    },
    Category {
        name: "3D Modeling (AR & NFT)",
        slug: "3d-modeling",
        description: "We create highly detailed 3D models that bring your product into virtual spaces, bringing out the best of your brand.",
    },
    Category {
        name: "Video Editing",
        slug: "video-editing",
        description: "Story-driven video content with engaging cuts, transitions, and sound design to elevate your message.",
    },
];

static BY_SLUG: Lazy<HashMap<&'static str, &'static Category>> =
    Lazy::new(|| CATEGORIES.iter().map(|c| (c.slug, c)).collect());

static BY_NAME: Lazy<HashMap<&'static str, &'static Category>> =
    Lazy::new(|| CATEGORIES.iter().map(|c| (c.name, c)).collect());

pub fn category_by_slug(slug: &str) -> Option<&'static Category> {
    BY_SLUG.get(slug).copied()
}

pub fn category_by_name(name: &str) -> Option<&'static Category> {
    BY_NAME.get(name).copied()
}

pub fn slug_from_category_name(name: &str) -> Option<&'static str> {
    category_by_name(name).map(|c| c.slug)
}

/// URL slug for a work title: lowercase alphanumeric runs joined by `-`.
pub fn slug_from_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Date,
    Name,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Stable sort; ties keep their incoming order.
pub fn sort_works(works: &mut [Work], by: SortBy, order: SortOrder) {
    works.sort_by(|a, b| {
        let ord = match by {
            SortBy::Date => a.created_at.cmp(&b.created_at),
            SortBy::Name => compare_text(&a.title, &b.title),
            SortBy::Category => compare_text(
                a.category.as_deref().unwrap_or_default(),
                b.category.as_deref().unwrap_or_default(),
            ),
        };
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// Groups works under their catalog category, in catalog order.
///
/// Works without a known category are left out, as are empty categories.
pub fn group_by_category(works: &[Work]) -> Vec<(&'static Category, Vec<&Work>)> {
    CATEGORIES
        .iter()
        .map(|category| {
            let members: Vec<&Work> = works
                .iter()
                .filter(|w| w.category.as_deref() == Some(category.name))
                .collect();
            (category, members)
        })
        .filter(|(_, members)| !members.is_empty())
        .collect()
}

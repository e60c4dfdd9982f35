//! Portfolio content core: grid layout engine, image editor and local store.

pub mod config;
pub mod editor;
pub mod error;
pub mod layout;
pub mod media;
pub mod models;
pub mod render;
pub mod service;

pub use error::{Error, Result};
pub use layout::{compute_layout, CachedLayoutComputer, GridLayout, UNIT_HEIGHT};
pub use models::{GridItem, GridRow, ImageDescriptor, ImageKey};

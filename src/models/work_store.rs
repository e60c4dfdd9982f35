//! SQLite-backed store for portfolio content.
//!
//! This module provides the `WorkStore` struct which manages all database
//! operations, including:
//! - Works and their ordered images (layout flags live in a JSON column)
//! - Featured brands, advertisements and the careers link

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    slug_from_title, Advertisement, Brand, CarrierLink, NewWork, Work, WorkForm, WorkImageRecord,
};

/// Maximum number of advertisements live at once.
pub const MAX_ADVERTISEMENTS: usize = 3;

const WORK_COLUMNS: &str =
    "id, title, description, category, cover_image, created_at, updated_at";

const IMAGE_COLUMNS: &str =
    "id, work_id, image_url, position, transformations, caption, alt_text";

/// A work image about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkImage {
    pub image_url: String,
    pub position: i64,
    pub transformations: Value,
    pub caption: Option<String>,
    pub alt_text: Option<String>,
}

/// New layout and captions for an already stored image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpdate {
    pub id: i64,
    pub position: i64,
    pub transformations: Value,
    pub caption: Option<String>,
    pub alt_text: Option<String>,
}

/// Every row change made by saving a work, applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkEdit {
    pub form: WorkForm,
    pub cover_image: Option<String>,
    pub delete_images: Vec<i64>,
    pub add_images: Vec<NewWorkImage>,
    pub update_images: Vec<ImageUpdate>,
}

/// SQLite-backed storage for works, images and site content.
pub struct WorkStore {
    conn: Connection,
}

impl WorkStore {
    /// Opens or creates the database at the specified path.
    ///
    /// Configures SQLite with WAL journaling and enforced foreign keys.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let store = Self { conn };
        store.create_tables()?;

        info!("Opened work store at {:?}", path);
        Ok(store)
    }

    /// Creates the database schema if it doesn't exist.
    fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS works (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT,
                cover_image TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_works_created_at ON works(created_at);

            CREATE TABLE IF NOT EXISTS work_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                work_id INTEGER NOT NULL,
                image_url TEXT NOT NULL,
                position INTEGER,
                transformations TEXT,
                caption TEXT,
                alt_text TEXT,
                FOREIGN KEY (work_id) REFERENCES works(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_work_images_work
                ON work_images(work_id, position);

            CREATE TABLE IF NOT EXISTS brands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sort_order INTEGER NOT NULL,
                selected INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS advertisements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                image_path TEXT NOT NULL,
                link TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS carrier_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            ",
        )?;

        debug!("Database tables created/verified");
        Ok(())
    }

    // =========================================================================
    // Works
    // =========================================================================

    pub fn insert_work(&self, work: &NewWork) -> Result<Work> {
        let id = insert_work_row(&self.conn, work)?;
        debug!(work_id = id, "Inserted work");
        self.get_work(id)?.ok_or_else(|| Error::not_found("work", id))
    }

    /// Inserts a work together with its images in one transaction.
    pub fn create_work(&mut self, work: &NewWork, images: &[NewWorkImage]) -> Result<Work> {
        let tx = self.conn.transaction()?;
        let id = insert_work_row(&tx, work)?;
        insert_image_rows(&tx, id, images)?;
        tx.commit()?;

        info!(work_id = id, images = images.len(), "Created work");
        self.get_work(id)?.ok_or_else(|| Error::not_found("work", id))
    }

    /// Updates title, description, category and cover of an existing work.
    pub fn update_work(&self, id: i64, form: &WorkForm, cover_image: Option<&str>) -> Result<Work> {
        update_work_row(&self.conn, id, form, cover_image)?;
        self.get_work(id)?.ok_or_else(|| Error::not_found("work", id))
    }

    /// Applies a saved edit in one transaction: image deletes and updates,
    /// the work fields, then new images. Either all of it lands or none of it.
    pub fn apply_work_edit(&mut self, id: i64, edit: &WorkEdit) -> Result<Work> {
        let tx = self.conn.transaction()?;
        delete_image_rows(&tx, &edit.delete_images)?;
        for update in &edit.update_images {
            update_image_row(&tx, update)?;
        }
        update_work_row(&tx, id, &edit.form, edit.cover_image.as_deref())?;
        insert_image_rows(&tx, id, &edit.add_images)?;
        tx.commit()?;

        debug!(
            work_id = id,
            deleted = edit.delete_images.len(),
            added = edit.add_images.len(),
            updated = edit.update_images.len(),
            "Applied work edit"
        );
        self.get_work(id)?.ok_or_else(|| Error::not_found("work", id))
    }

    pub fn get_work(&self, id: i64) -> Result<Option<Work>> {
        let work = self
            .conn
            .query_row(
                &format!("SELECT {WORK_COLUMNS} FROM works WHERE id = ?1"),
                params![id],
                work_from_row,
            )
            .optional()?;
        Ok(work)
    }

    /// Finds the work whose title slug matches `slug`.
    pub fn find_work_by_slug(&self, slug: &str) -> Result<Option<Work>> {
        Ok(self
            .list_works()?
            .into_iter()
            .find(|work| slug_from_title(&work.title) == slug))
    }

    /// All works, newest first.
    pub fn list_works(&self) -> Result<Vec<Work>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {WORK_COLUMNS} FROM works ORDER BY created_at DESC, id DESC"
        ))?;
        let works = stmt
            .query_map([], work_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(works)
    }

    /// Case-insensitive substring search over title, description and category.
    /// A blank query returns every work.
    pub fn search_works(&self, query: &str) -> Result<Vec<Work>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_works();
        }

        let mut stmt = self.conn.prepare_cached(&format!(
            "
            SELECT {WORK_COLUMNS} FROM works
            WHERE instr(lower(title), lower(?1)) > 0
               OR instr(lower(description), lower(?1)) > 0
               OR instr(lower(coalesce(category, '')), lower(?1)) > 0
            ORDER BY created_at DESC, id DESC
            "
        ))?;
        let works = stmt
            .query_map(params![query], work_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(works)
    }

    /// Deletes a work and its images.
    ///
    /// Returns the media URLs (cover first, then images) that referenced it.
    pub fn delete_work(&mut self, id: i64) -> Result<Vec<String>> {
        let tx = self.conn.transaction()?;

        let cover: Option<Option<String>> = tx
            .query_row(
                "SELECT cover_image FROM works WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(cover) = cover else {
            return Err(Error::not_found("work", id));
        };

        let mut urls: Vec<String> = cover.into_iter().collect();
        {
            let mut stmt = tx.prepare(
                "SELECT image_url FROM work_images WHERE work_id = ?1 ORDER BY position, id",
            )?;
            let images = stmt
                .query_map(params![id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            urls.extend(images);
        }

        tx.execute("DELETE FROM work_images WHERE work_id = ?1", params![id])?;
        tx.execute("DELETE FROM works WHERE id = ?1", params![id])?;
        tx.commit()?;

        info!(work_id = id, media = urls.len(), "Deleted work");
        Ok(urls)
    }

    // =========================================================================
    // Work Images
    // =========================================================================

    /// Images of a work ordered by position (ties by id).
    pub fn get_work_images(&self, work_id: i64) -> Result<Vec<WorkImageRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {IMAGE_COLUMNS} FROM work_images WHERE work_id = ?1 ORDER BY position, id"
        ))?;
        let images = stmt
            .query_map(params![work_id], image_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(images)
    }

    /// Batch inserts images for a work in a single transaction.
    /// Returns the new ids in input order.
    pub fn insert_work_images(&mut self, work_id: i64, images: &[NewWorkImage]) -> Result<Vec<i64>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.transaction()?;
        let ids = insert_image_rows(&tx, work_id, images)?;
        tx.commit()?;

        debug!(work_id, count = ids.len(), "Inserted work images");
        Ok(ids)
    }

    pub fn update_work_image(&self, update: &ImageUpdate) -> Result<bool> {
        update_image_row(&self.conn, update)
    }

    pub fn delete_work_images(&mut self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let count = delete_image_rows(&tx, ids)?;
        tx.commit()?;
        Ok(count)
    }

    // =========================================================================
    // Brands
    // =========================================================================

    pub fn list_brands(&self) -> Result<Vec<Brand>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, sort_order, selected, created_at FROM brands ORDER BY sort_order, id",
        )?;
        let brands = stmt
            .query_map([], brand_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(brands)
    }

    pub fn selected_brands(&self) -> Result<Vec<Brand>> {
        Ok(self
            .list_brands()?
            .into_iter()
            .filter(|brand| brand.selected)
            .collect())
    }

    /// Adds an unselected brand at the end of the current order.
    pub fn add_brand(&self, name: &str) -> Result<Brand> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM brands", [], |row| row.get(0))?;
        let now = Self::now();
        self.conn.execute(
            "INSERT INTO brands (name, sort_order, selected, created_at) VALUES (?1, ?2, 0, ?3)",
            params![name, count, now],
        )?;
        Ok(Brand {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            order: count,
            selected: false,
            created_at: now,
        })
    }

    pub fn delete_brand(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM brands WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn set_brand_selected(&self, id: i64, selected: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE brands SET selected = ?1 WHERE id = ?2",
            params![selected, id],
        )?;
        if rows == 0 {
            return Err(Error::not_found("brand", id));
        }
        Ok(())
    }

    /// Rewrites brand order so that `ids[i]` gets order `i`.
    pub fn reorder_brands(&mut self, ids: &[i64]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("UPDATE brands SET sort_order = ?1 WHERE id = ?2")?;
            for (order, id) in ids.iter().enumerate() {
                stmt.execute(params![order as i64, id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // =========================================================================
    // Advertisements / Careers Link
    // =========================================================================

    /// All advertisements, newest first.
    pub fn list_advertisements(&self) -> Result<Vec<Advertisement>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, image_path, link, created_at FROM advertisements ORDER BY created_at DESC, id DESC",
        )?;
        let ads = stmt
            .query_map([], |row| {
                Ok(Advertisement {
                    id: row.get(0)?,
                    image_path: row.get(1)?,
                    link: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ads)
    }

    pub fn add_advertisement(&self, image_path: &str, link: &str) -> Result<Advertisement> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM advertisements", [], |row| row.get(0))?;
        if count as usize >= MAX_ADVERTISEMENTS {
            return Err(Error::AdvertisementLimit {
                limit: MAX_ADVERTISEMENTS,
            });
        }

        let now = Self::now();
        self.conn.execute(
            "INSERT INTO advertisements (image_path, link, created_at) VALUES (?1, ?2, ?3)",
            params![image_path, link, now],
        )?;
        Ok(Advertisement {
            id: self.conn.last_insert_rowid(),
            image_path: image_path.to_string(),
            link: link.to_string(),
            created_at: now,
        })
    }

    /// Deletes an advertisement, returning its image path for media cleanup.
    pub fn delete_advertisement(&self, id: i64) -> Result<Option<String>> {
        let image_path: Option<String> = self
            .conn
            .query_row(
                "SELECT image_path FROM advertisements WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if image_path.is_some() {
            self.conn
                .execute("DELETE FROM advertisements WHERE id = ?1", params![id])?;
        }
        Ok(image_path)
    }

    /// The most recent careers link, if one was set.
    pub fn carrier_link(&self) -> Result<Option<CarrierLink>> {
        let link = self
            .conn
            .query_row(
                "SELECT id, url, created_at FROM carrier_links ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(CarrierLink {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(link)
    }

    /// Replaces any existing careers link.
    pub fn set_carrier_link(&mut self, url: &str) -> Result<CarrierLink> {
        let now = Self::now();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM carrier_links", [])?;
        tx.execute(
            "INSERT INTO carrier_links (url, created_at) VALUES (?1, ?2)",
            params![url, now],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(CarrierLink {
            id,
            url: url.to_string(),
            created_at: now,
        })
    }

    // =========================================================================
    // Utility Methods
    // =========================================================================

    /// Returns the current Unix timestamp.
    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Gets database statistics for debugging.
    pub fn stats(&self) -> Result<DbStats> {
        let count = |table: &str| -> Result<i64> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
        };

        let page_count: i64 = self.conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;

        Ok(DbStats {
            work_count: count("works")?,
            image_count: count("work_images")?,
            brand_count: count("brands")?,
            advertisement_count: count("advertisements")?,
            db_size_bytes: page_count * page_size,
        })
    }

    /// Moves a corrupted database aside and starts a fresh one.
    pub fn handle_corruption(path: &Path) -> Result<Self> {
        warn!("Handling potential database corruption at {:?}", path);

        let backup_path = path.with_extension("sqlite.corrupted");
        if path.exists() {
            std::fs::rename(path, &backup_path)?;
            warn!("Backed up corrupted database to {:?}", backup_path);
        }

        Self::open(path)
    }
}

/// Database statistics for debugging and monitoring.
#[derive(Debug, Clone)]
pub struct DbStats {
    pub work_count: i64,
    pub image_count: i64,
    pub brand_count: i64,
    pub advertisement_count: i64,
    pub db_size_bytes: i64,
}

// =========================================================================
// Helper Functions
// =========================================================================

fn insert_work_row(conn: &Connection, work: &NewWork) -> Result<i64> {
    conn.execute(
        "
        INSERT INTO works (title, description, category, cover_image, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ",
        params![
            work.title.trim(),
            work.description,
            work.category,
            work.cover_image,
            WorkStore::now()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_work_row(
    conn: &Connection,
    id: i64,
    form: &WorkForm,
    cover_image: Option<&str>,
) -> Result<()> {
    let updated = conn.execute(
        "
        UPDATE works
        SET title = ?1, description = ?2, category = ?3, cover_image = ?4, updated_at = ?5
        WHERE id = ?6
        ",
        params![
            form.title.trim(),
            form.description,
            form.category,
            cover_image,
            WorkStore::now(),
            id
        ],
    )?;
    if updated == 0 {
        return Err(Error::not_found("work", id));
    }
    Ok(())
}

fn insert_image_rows(conn: &Connection, work_id: i64, images: &[NewWorkImage]) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "
        INSERT INTO work_images (work_id, image_url, position, transformations, caption, alt_text)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
    )?;
    let mut ids = Vec::with_capacity(images.len());
    for image in images {
        stmt.execute(params![
            work_id,
            image.image_url,
            image.position,
            serde_json::to_string(&image.transformations)?,
            image.caption,
            image.alt_text,
        ])?;
        ids.push(conn.last_insert_rowid());
    }
    Ok(ids)
}

fn update_image_row(conn: &Connection, update: &ImageUpdate) -> Result<bool> {
    let rows = conn.execute(
        "
        UPDATE work_images
        SET position = ?1, transformations = ?2, caption = ?3, alt_text = ?4
        WHERE id = ?5
        ",
        params![
            update.position,
            serde_json::to_string(&update.transformations)?,
            update.caption,
            update.alt_text,
            update.id
        ],
    )?;
    Ok(rows > 0)
}

fn delete_image_rows(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let mut stmt = conn.prepare_cached("DELETE FROM work_images WHERE id = ?1")?;
    let mut count = 0;
    for id in ids {
        count += stmt.execute(params![id])?;
    }
    Ok(count)
}

fn work_from_row(row: &Row<'_>) -> rusqlite::Result<Work> {
    Ok(Work {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        cover_image: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<WorkImageRecord> {
    let id: i64 = row.get(0)?;
    let raw: Option<String> = row.get(4)?;
    let transformations = raw.and_then(|text| match serde_json::from_str::<Value>(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(image_id = id, error = %err, "Ignoring malformed transformations");
            None
        }
    });

    Ok(WorkImageRecord {
        id,
        work_id: row.get(1)?,
        image_url: row.get(2)?,
        position: row.get(3)?,
        transformations,
        caption: row.get(5)?,
        alt_text: row.get(6)?,
    })
}

fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<Brand> {
    Ok(Brand {
        id: row.get(0)?,
        name: row.get(1)?,
        order: row.get(2)?,
        selected: row.get(3)?,
        created_at: row.get(4)?,
    })
}

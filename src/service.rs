//! Async facade over the work store, media storage and layout engine.
//!
//! Store and filesystem access is synchronous, so every operation runs on the
//! blocking pool and the async caller only awaits the result.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::editor::{EditableImage, ImageEditor, PendingUpload};
use crate::error::{Error, Result};
use crate::layout::CachedLayoutComputer;
use crate::media::{MediaStorage, ADS_FOLDER, COVERS_FOLDER, WORK_IMAGES_FOLDER};
use crate::models::{
    sort_works, Advertisement, Brand, CarrierLink, GridRow, ImageDescriptor, ImageUpdate, NewWork,
    NewWorkImage, SortBy, SortOrder, Work, WorkEdit, WorkForm, WorkImageRecord, WorkStore,
    MAX_ADVERTISEMENTS,
};

/// A work with its stored images and their computed rows.
#[derive(Debug, Clone)]
pub struct WorkGallery {
    pub work: Work,
    pub records: Vec<WorkImageRecord>,
    pub rows: Vec<GridRow>,
}

#[derive(Clone)]
pub struct WorkService {
    store: Arc<Mutex<WorkStore>>,
    media: MediaStorage,
    layouts: Arc<CachedLayoutComputer>,
}

impl WorkService {
    pub fn new(store: WorkStore, media: MediaStorage, layouts: CachedLayoutComputer) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            media,
            layouts: Arc::new(layouts),
        }
    }

    /// Opens the store and media root described by `settings`.
    ///
    /// A database that fails to open is moved aside and recreated.
    pub fn open(settings: &Settings) -> Result<Self> {
        let store = match WorkStore::open(&settings.database_path) {
            Ok(store) => store,
            Err(Error::Sqlite(e)) => {
                warn!("Failed to open database: {}", e);
                WorkStore::handle_corruption(&settings.database_path)?
            }
            Err(e) => return Err(e),
        };
        let media = MediaStorage::new(&settings.media_root, settings.media_base_url.clone());
        let layouts = CachedLayoutComputer::new(settings.layout_cache_entries);
        Ok(Self::new(store, media, layouts))
    }

    pub fn media(&self) -> &MediaStorage {
        &self.media
    }

    /// Runs `f` with exclusive store access on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut WorkStore, &MediaStorage) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let media = self.media.clone();
        task::spawn_blocking(move || {
            let mut store = store.lock();
            f(&mut store, &media)
        })
        .await?
    }

    /// Works filtered by `search` (blank lists all) and sorted.
    pub async fn list_works(
        &self,
        search: Option<String>,
        by: SortBy,
        order: SortOrder,
    ) -> Result<Vec<Work>> {
        let mut works = self
            .with_store(move |store, _| store.search_works(search.as_deref().unwrap_or_default()))
            .await?;
        sort_works(&mut works, by, order);
        Ok(works)
    }

    /// A fresh descriptor list for the work's current images.
    pub async fn work_images(&self, work_id: i64) -> Result<Vec<ImageDescriptor>> {
        let records = self
            .with_store(move |store, _| store.get_work_images(work_id))
            .await?;
        Ok(records.iter().map(ImageDescriptor::from_record).collect())
    }

    /// Looks a work up by title slug and lays out its images.
    pub async fn gallery(&self, slug: &str) -> Result<Option<WorkGallery>> {
        let slug = slug.to_string();
        let found = self
            .with_store(move |store, _| {
                let Some(work) = store.find_work_by_slug(&slug)? else {
                    return Ok(None);
                };
                let records = store.get_work_images(work.id)?;
                Ok(Some((work, records)))
            })
            .await?;

        Ok(found.map(|(work, records)| {
            let descriptors: Vec<ImageDescriptor> =
                records.iter().map(ImageDescriptor::from_record).collect();
            let rows = self.layouts.compute(&descriptors);
            debug!(work_id = work.id, rows = rows.len(), "Computed gallery layout");
            WorkGallery {
                work,
                records,
                rows,
            }
        }))
    }

    /// Loads a work and an editor over its images.
    pub async fn open_editor(&self, work_id: i64) -> Result<(Work, ImageEditor)> {
        self.with_store(move |store, _| {
            let work = store
                .get_work(work_id)?
                .ok_or_else(|| Error::not_found("work", work_id))?;
            let records = store.get_work_images(work_id)?;
            Ok((work, ImageEditor::from_records(&records)))
        })
        .await
    }

    /// Creates a work from the form, a cover upload and the editor's uploads.
    ///
    /// Files are written first and the rows inserted in one transaction; on
    /// failure the files written so far are removed again.
    pub async fn create_work(
        &self,
        form: WorkForm,
        cover: Option<PendingUpload>,
        editor: ImageEditor,
    ) -> Result<Work> {
        form.validate(Some(!editor.is_empty()))?;
        let cover = cover.ok_or_else(|| Error::Validation("Cover image is required".into()))?;

        let work = self
            .with_store(move |store, media| {
                with_uploads(media, |uploads| {
                    let cover_url = uploads.upload(&cover, COVERS_FOLDER)?;
                    let images = upload_images(uploads, editor.images())?;
                    store.create_work(
                        &NewWork {
                            title: form.title.trim().to_string(),
                            description: form.description.clone(),
                            category: form.category().to_string(),
                            cover_image: cover_url,
                        },
                        &images,
                    )
                })
            })
            .await?;

        info!(work_id = work.id, title = %work.title, "Created work");
        Ok(work)
    }

    /// Saves edits made to an existing work.
    ///
    /// `original` is the editor state as loaded; only the difference is written.
    /// New files are uploaded before the single store transaction, replaced
    /// files are removed only after it commits.
    pub async fn save_work(
        &self,
        work_id: i64,
        form: WorkForm,
        cover: Option<PendingUpload>,
        original: Vec<EditableImage>,
        editor: ImageEditor,
    ) -> Result<Work> {
        form.validate(None)?;

        let work = self
            .with_store(move |store, media| {
                let existing = store
                    .get_work(work_id)?
                    .ok_or_else(|| Error::not_found("work", work_id))?;

                let changes = editor.changes(&original);
                debug!(
                    work_id,
                    delete = changes.to_delete.len(),
                    add = changes.to_add.len(),
                    update = changes.to_update.len(),
                    "Applying image changes"
                );

                let (work, cover_url) = with_uploads(media, |uploads| {
                    let cover_url = match (&cover, &existing.cover_image) {
                        (Some(upload), _) => uploads.upload(upload, COVERS_FOLDER)?,
                        (None, Some(old)) => old.clone(),
                        (None, None) => {
                            return Err(Error::Validation("Cover image is required".into()))
                        }
                    };

                    let edit = WorkEdit {
                        form,
                        cover_image: Some(cover_url.clone()),
                        delete_images: changes.to_delete.iter().filter_map(|img| img.id).collect(),
                        add_images: upload_images(uploads, &changes.to_add)?,
                        update_images: changes.to_update.iter().filter_map(image_update).collect(),
                    };
                    let work = store.apply_work_edit(work_id, &edit)?;
                    Ok((work, cover_url))
                })?;

                if let Some(old) = existing.cover_image.filter(|old| *old != cover_url) {
                    remove_media(media, &old);
                }
                for url in changes.to_delete.iter().filter_map(|img| img.image_url.as_deref()) {
                    remove_media(media, url);
                }
                Ok(work)
            })
            .await?;

        self.layouts.invalidate();
        info!(work_id, "Saved work");
        Ok(work)
    }

    /// Deletes a work, then its media files.
    pub async fn delete_work(&self, work_id: i64) -> Result<()> {
        let removed = self
            .with_store(move |store, media| {
                let urls = store.delete_work(work_id)?;
                for url in &urls {
                    remove_media(media, url);
                }
                Ok(urls.len())
            })
            .await?;

        self.layouts.invalidate();
        info!(work_id, media = removed, "Deleted work and media");
        Ok(())
    }

    // =========================================================================
    // Brands
    // =========================================================================

    /// Brands in display order.
    pub async fn brands(&self) -> Result<Vec<Brand>> {
        self.with_store(|store, _| store.list_brands()).await
    }

    /// Selected brands in display order, as shown in the carousel.
    pub async fn featured_brands(&self) -> Result<Vec<Brand>> {
        self.with_store(|store, _| store.selected_brands()).await
    }

    pub async fn add_brand(&self, name: &str) -> Result<Brand> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("Please enter a brand name".into()));
        }
        self.with_store(move |store, _| store.add_brand(&name)).await
    }

    pub async fn delete_brand(&self, id: i64) -> Result<bool> {
        self.with_store(move |store, _| store.delete_brand(id)).await
    }

    pub async fn set_brand_selected(&self, id: i64, selected: bool) -> Result<()> {
        self.with_store(move |store, _| store.set_brand_selected(id, selected))
            .await
    }

    /// Puts brands in the order given by `ids`.
    pub async fn reorder_brands(&self, ids: Vec<i64>) -> Result<()> {
        self.with_store(move |store, _| store.reorder_brands(&ids))
            .await
    }

    // =========================================================================
    // Advertisements / Careers Link
    // =========================================================================

    pub async fn advertisements(&self) -> Result<Vec<Advertisement>> {
        self.with_store(|store, _| store.list_advertisements()).await
    }

    /// Uploads an ad image and records the ad.
    ///
    /// The limit is checked before anything is written.
    pub async fn add_advertisement(
        &self,
        image: PendingUpload,
        link: &str,
    ) -> Result<Advertisement> {
        let link = link.trim().to_string();
        if link.is_empty() {
            return Err(Error::Validation(
                "Upload an image and provide a valid link.".into(),
            ));
        }

        let ad = self
            .with_store(move |store, media| {
                if store.list_advertisements()?.len() >= MAX_ADVERTISEMENTS {
                    return Err(Error::AdvertisementLimit {
                        limit: MAX_ADVERTISEMENTS,
                    });
                }
                with_uploads(media, |uploads| {
                    let url = uploads.upload(&image, ADS_FOLDER)?;
                    store.add_advertisement(&url, &link)
                })
            })
            .await?;

        info!(ad_id = ad.id, "Added advertisement");
        Ok(ad)
    }

    /// Removes an ad and its image. Returns whether the ad existed.
    pub async fn delete_advertisement(&self, id: i64) -> Result<bool> {
        self.with_store(move |store, media| {
            let Some(image_path) = store.delete_advertisement(id)? else {
                return Ok(false);
            };
            remove_media(media, &image_path);
            Ok(true)
        })
        .await
    }

    pub async fn carrier_link(&self) -> Result<Option<CarrierLink>> {
        self.with_store(|store, _| store.carrier_link()).await
    }

    pub async fn set_carrier_link(&self, url: &str) -> Result<CarrierLink> {
        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(Error::Validation("Please enter a valid URL".into()));
        }
        self.with_store(move |store, _| store.set_carrier_link(&url))
            .await
    }

    /// Computes rows for an arbitrary descriptor list through the shared cache.
    pub fn layout(&self, images: &[ImageDescriptor]) -> Vec<GridRow> {
        self.layouts.compute(images)
    }
}

/// Files written during one operation.
struct Uploads<'a> {
    media: &'a MediaStorage,
    urls: Vec<String>,
}

impl Uploads<'_> {
    fn upload(&mut self, upload: &PendingUpload, folder: &str) -> Result<String> {
        let url = self.media.upload(upload, folder)?;
        self.urls.push(url.clone());
        Ok(url)
    }
}

/// Runs `f`, removing every file it uploaded if it fails.
fn with_uploads<T>(
    media: &MediaStorage,
    f: impl FnOnce(&mut Uploads<'_>) -> Result<T>,
) -> Result<T> {
    let mut uploads = Uploads {
        media,
        urls: Vec::new(),
    };
    let result = f(&mut uploads);
    if result.is_err() {
        for url in &uploads.urls {
            remove_media(media, url);
        }
    }
    result
}

fn upload_images(uploads: &mut Uploads<'_>, images: &[EditableImage]) -> Result<Vec<NewWorkImage>> {
    let mut stored = Vec::new();
    for img in images {
        let Some(upload) = &img.upload else {
            continue;
        };
        stored.push(NewWorkImage {
            image_url: uploads.upload(upload, WORK_IMAGES_FOLDER)?,
            position: img.position,
            transformations: img.transformations_value(),
            caption: img.stored_caption(),
            alt_text: img.stored_alt_text(),
        });
    }
    Ok(stored)
}

fn image_update(img: &EditableImage) -> Option<ImageUpdate> {
    Some(ImageUpdate {
        id: img.id?,
        position: img.position,
        transformations: img.transformations_value(),
        caption: img.stored_caption(),
        alt_text: img.stored_alt_text(),
    })
}

/// Best-effort removal; a failure leaves an orphaned file behind.
fn remove_media(media: &MediaStorage, url: &str) {
    if let Err(e) = media.delete(url) {
        warn!(url, error = %e, "Failed to remove media file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::{tempdir, TempDir};

    fn png() -> Vec<u8> {
        let img = image::RgbImage::new(2, 2);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn service() -> (TempDir, WorkService) {
        let dir = tempdir().unwrap();
        let settings = Settings {
            database_path: dir.path().join("db.sqlite"),
            media_root: dir.path().join("media"),
            media_base_url: "/media".into(),
            layout_cache_entries: 4,
        };
        let service = WorkService::open(&settings).unwrap();
        (dir, service)
    }

    fn form(title: &str) -> WorkForm {
        WorkForm {
            title: title.into(),
            description: "A rebrand".into(),
            category: Some("Brand Identity Development".into()),
        }
    }

    fn editor_with(count: usize) -> ImageEditor {
        let mut editor = ImageEditor::new();
        editor.add_uploads((0..count).map(|i| PendingUpload::new(format!("{i}.png"), png())));
        editor
    }

    async fn create(service: &WorkService, title: &str, images: usize) -> Work {
        service
            .create_work(
                form(title),
                Some(PendingUpload::new("cover.png", png())),
                editor_with(images),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_gallery() {
        let (_dir, service) = service();
        let mut editor = editor_with(3);
        editor.toggle_full_width(0);
        let work = service
            .create_work(form("Nova Coffee"), Some(PendingUpload::new("c.png", png())), editor)
            .await
            .unwrap();

        let gallery = service.gallery("nova-coffee").await.unwrap().unwrap();
        assert_eq!(gallery.work.id, work.id);
        assert_eq!(gallery.records.len(), 3);
        assert_eq!(gallery.rows.len(), 2);
        assert!(gallery.rows[0].is_full_width());
        assert_eq!(gallery.rows[1].items.len(), 2);

        assert!(service.gallery("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_validates_before_upload() {
        let (dir, service) = service();
        let err = service
            .create_work(form("Nova"), Some(PendingUpload::new("c.png", png())), ImageEditor::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please add at least one image");

        let err = service
            .create_work(form("Nova"), None, editor_with(1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cover image is required");
        assert!(!dir.path().join("media").join(COVERS_FOLDER).exists());
    }

    #[tokio::test]
    async fn test_save_applies_changes() {
        let (_dir, service) = service();
        let work = create(&service, "Orbit", 3).await;

        let (_, mut editor) = service.open_editor(work.id).await.unwrap();
        let original = editor.images().to_vec();
        let removed_url = original[0].image_url.clone().unwrap();
        editor.remove(0);
        editor.increase_row_span(0);
        editor.add_uploads([PendingUpload::new("new.png", png())]);

        service
            .save_work(work.id, form("Orbit"), None, original, editor)
            .await
            .unwrap();

        let descriptors = service.work_images(work.id).await.unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].row_span, 2);
        assert!(service.media().path_for_url(&removed_url).is_some_and(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_save_replaces_cover() {
        let (_dir, service) = service();
        let work = create(&service, "Orbit", 1).await;
        let old_cover = work.cover_image.clone().unwrap();

        let (_, editor) = service.open_editor(work.id).await.unwrap();
        let original = editor.images().to_vec();
        let saved = service
            .save_work(
                work.id,
                form("Orbit 2"),
                Some(PendingUpload::new("cover2.png", png())),
                original,
                editor,
            )
            .await
            .unwrap();

        assert_eq!(saved.title, "Orbit 2");
        assert_ne!(saved.cover_image.as_deref(), Some(old_cover.as_str()));
        assert!(!service.media().path_for_url(&old_cover).unwrap().exists());
    }

    fn stored_files(dir: &TempDir, folder: &str) -> usize {
        std::fs::read_dir(dir.path().join("media").join(folder))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing_behind() {
        let (dir, service) = service();
        let mut editor = editor_with(1);
        editor.add_uploads([PendingUpload::new("bad.txt", b"not an image".to_vec())]);

        let err = service
            .create_work(form("Nova"), Some(PendingUpload::new("c.png", png())), editor)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));

        let works = service
            .list_works(None, SortBy::Date, SortOrder::Desc)
            .await
            .unwrap();
        assert!(works.is_empty());
        assert_eq!(stored_files(&dir, COVERS_FOLDER), 0);
        assert_eq!(stored_files(&dir, WORK_IMAGES_FOLDER), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_stored_state() {
        let (dir, service) = service();
        let work = create(&service, "Orbit", 2).await;
        let old_cover = work.cover_image.clone().unwrap();

        let (_, mut editor) = service.open_editor(work.id).await.unwrap();
        let original = editor.images().to_vec();
        let removed_url = original[0].image_url.clone().unwrap();
        editor.remove(0);
        editor.add_uploads([PendingUpload::new("bad.txt", b"not an image".to_vec())]);

        let err = service
            .save_work(
                work.id,
                form("Orbit 2"),
                Some(PendingUpload::new("cover2.png", png())),
                original,
                editor,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));

        let (stored, editor) = service.open_editor(work.id).await.unwrap();
        assert_eq!(stored.title, "Orbit");
        assert_eq!(stored.cover_image.as_deref(), Some(old_cover.as_str()));
        assert!(service.media().path_for_url(&old_cover).unwrap().exists());
        assert!(service.media().path_for_url(&removed_url).unwrap().exists());
        assert_eq!(editor.len(), 2);
        assert_eq!(stored_files(&dir, COVERS_FOLDER), 1);
        assert_eq!(stored_files(&dir, WORK_IMAGES_FOLDER), 2);
    }

    #[tokio::test]
    async fn test_save_missing_work_uploads_nothing() {
        let (dir, service) = service();
        let err = service
            .save_work(
                42,
                form("Ghost"),
                Some(PendingUpload::new("cover.png", png())),
                Vec::new(),
                ImageEditor::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(stored_files(&dir, COVERS_FOLDER), 0);
    }

    #[tokio::test]
    async fn test_advertisements() {
        let (dir, service) = service();
        let mut ids = Vec::new();
        for i in 0..MAX_ADVERTISEMENTS {
            let ad = service
                .add_advertisement(
                    PendingUpload::new(format!("ad{i}.png"), png()),
                    " https://example.com ",
                )
                .await
                .unwrap();
            assert!(ad.image_path.starts_with("/media/advertisements/"));
            assert_eq!(ad.link, "https://example.com");
            ids.push(ad.id);
        }
        assert_eq!(stored_files(&dir, ADS_FOLDER), MAX_ADVERTISEMENTS);

        let err = service
            .add_advertisement(PendingUpload::new("ad.png", png()), "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AdvertisementLimit { limit: 3 }));
        assert_eq!(stored_files(&dir, ADS_FOLDER), MAX_ADVERTISEMENTS);

        assert!(service.delete_advertisement(ids[0]).await.unwrap());
        assert!(!service.delete_advertisement(ids[0]).await.unwrap());
        assert_eq!(stored_files(&dir, ADS_FOLDER), MAX_ADVERTISEMENTS - 1);
        assert_eq!(service.advertisements().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_advertisement_needs_link_and_image() {
        let (dir, service) = service();
        let err = service
            .add_advertisement(PendingUpload::new("ad.png", png()), "  ")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload an image and provide a valid link.");

        let err = service
            .add_advertisement(PendingUpload::new("ad.txt", b"text".to_vec()), "https://x.io")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));
        assert!(service.advertisements().await.unwrap().is_empty());
        assert_eq!(stored_files(&dir, ADS_FOLDER), 0);
    }

    #[tokio::test]
    async fn test_brand_management() {
        let (_dir, service) = service();
        let acme = service.add_brand(" Acme ").await.unwrap();
        let globex = service.add_brand("Globex").await.unwrap();
        assert_eq!(acme.name, "Acme");
        assert!(service.add_brand("   ").await.is_err());

        service.set_brand_selected(globex.id, true).await.unwrap();
        service.set_brand_selected(acme.id, true).await.unwrap();
        service.reorder_brands(vec![globex.id, acme.id]).await.unwrap();

        let featured: Vec<String> = service
            .featured_brands()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(featured, vec!["Globex", "Acme"]);

        assert!(service.delete_brand(acme.id).await.unwrap());
        assert_eq!(service.brands().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_carrier_link() {
        let (_dir, service) = service();
        assert!(service.carrier_link().await.unwrap().is_none());
        assert!(service.set_carrier_link(" ").await.is_err());

        service.set_carrier_link("https://jobs.example.com").await.unwrap();
        let link = service.carrier_link().await.unwrap().unwrap();
        assert_eq!(link.url, "https://jobs.example.com");
    }

    #[tokio::test]
    async fn test_delete_work_removes_media() {
        let (_dir, service) = service();
        let work = create(&service, "Orbit", 2).await;
        let cover = service.media().path_for_url(work.cover_image.as_deref().unwrap()).unwrap();
        assert!(cover.exists());

        service.delete_work(work.id).await.unwrap();
        assert!(!cover.exists());
        assert!(matches!(
            service.open_editor(work.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_works_search_and_sort() {
        let (_dir, service) = service();
        create(&service, "beta", 1).await;
        create(&service, "Alpha", 1).await;

        let works = service
            .list_works(None, SortBy::Name, SortOrder::Asc)
            .await
            .unwrap();
        let titles: Vec<&str> = works.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "beta"]);

        let found = service
            .list_works(Some("ALP".into()), SortBy::Date, SortOrder::Desc)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}

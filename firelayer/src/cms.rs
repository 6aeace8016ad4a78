//! Blog and image records for the content-management backend.
//!
//! The repositories here are what the HTTP handlers call. Every list and count goes
//! through the query layer, so `$or` filters, missing indexes and offset pagination
//! are handled the same way for every route.
//!
//! ```ignore
//! use firelayer::{cms::{BlogRepository, ImageRepository, ImageSource}, config::StoreConfig};
//!
//! let config = StoreConfig::from_env()?;
//! let images = ImageRepository::new(&store, &config);
//! let page = images
//!     .list("u1", ImageSource::parse(Some("ai")).as_ref(), Some(&PaginationParams::new(2, 24)))
//!     .await?;
//! ```

use std::{fmt, str::FromStr};

use bson::{Bson, DateTime, Document as BsonDocument, doc};
use chrono::Utc;
use futures::try_join;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use firelayer_core::{
    backend::StoreBackend,
    collection::{Record, TypedCollection},
    document::{Document, get_path},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    query::{Expr, Filter, Query, SortDirection},
    store::DocumentStore,
};

use crate::config::StoreConfig;

fn now() -> DateTime {
    DateTime::from_chrono(Utc::now())
}

/// Lifecycle of a blog post.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    Draft,
    #[default]
    Saved,
    Pending,
    Published,
    Rejected,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Saved => "saved",
            BlogStatus::Pending => "pending",
            BlogStatus::Published => "published",
            BlogStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogStatus {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BlogStatus::Draft),
            "saved" => Ok(BlogStatus::Saved),
            "pending" => Ok(BlogStatus::Pending),
            "published" => Ok(BlogStatus::Published),
            "rejected" => Ok(BlogStatus::Rejected),
            other => Err(DocumentStoreError::InvalidQuery(format!("unknown blog status `{other}`"))),
        }
    }
}

impl From<BlogStatus> for Bson {
    fn from(status: BlogStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}

/// Moderation state stored under `admin_review`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AdminReview {
    #[serde(default)]
    pub requested_at: Option<DateTime>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_by_name: Option<String>,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Blog {
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub status: BlogStatus,
    #[serde(default)]
    pub meta: BsonDocument,
    #[serde(default)]
    pub final_blog: BsonDocument,
    #[serde(default)]
    pub admin_review: AdminReview,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(default)]
    pub published_at: Option<DateTime>,
}

impl Blog {
    /// A freshly saved blog, stamped with the current UTC time.
    pub fn new(
        owner_id: impl Into<String>,
        owner_name: impl Into<String>,
        meta: BsonDocument,
        final_blog: BsonDocument,
    ) -> Self {
        let now = now();

        Self {
            owner_id: owner_id.into(),
            owner_name: owner_name.into(),
            status: BlogStatus::Saved,
            meta,
            final_blog,
            admin_review: AdminReview::default(),
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    /// `meta.title`, falling back to `final_blog.render.title`.
    pub fn title(&self) -> &str {
        non_empty(self.meta.get("title"))
            .or_else(|| non_empty(get_path(&self.final_blog, "render.title")))
            .unwrap_or_default()
    }
}

fn non_empty(value: Option<&Bson>) -> Option<&str> {
    value.and_then(Bson::as_str).filter(|text| !text.is_empty())
}

impl Document for Blog {
    fn collection_name() -> &'static str {
        "blogs"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Image {
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: String,
    pub image_url: String,
    #[serde(default)]
    pub meta: BsonDocument,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime,
}

impl Document for Image {
    fn collection_name() -> &'static str {
        "images"
    }
}

/// The `source` selector of the image gallery.
///
/// Images saved before sources were recorded have no `source` field (or a null one);
/// both the `ai` and `nano` views include them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Any generated image: `nano`, `blog` or unrecorded.
    Ai,
    /// Images from the image generator, or unrecorded.
    Nano,
    /// Exactly this source.
    Other(String),
}

impl ImageSource {
    /// Parses a query-string selector; an absent or empty value selects everything.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "" => None,
            "ai" => Some(ImageSource::Ai),
            "nano" => Some(ImageSource::Nano),
            other => Some(ImageSource::Other(other.to_string())),
        }
    }

    pub fn filter(&self) -> Expr {
        match self {
            ImageSource::Ai => Filter::or([
                Filter::is_in("source", ["nano", "blog"]),
                Filter::not_exists("source"),
                Filter::is_null("source"),
            ]),
            ImageSource::Nano => Filter::or([
                Filter::eq("source", "nano"),
                Filter::not_exists("source"),
                Filter::is_null("source"),
            ]),
            ImageSource::Other(source) => Filter::eq("source", source.as_str()),
        }
    }
}

/// Filter for one owner's images, optionally narrowed by source.
pub fn image_filter(owner_id: &str, source: Option<&ImageSource>) -> Expr {
    let owner = Filter::eq("owner_id", owner_id);

    match source {
        Some(source) => owner.and(source.filter()),
        None => owner,
    }
}

/// The administrator acting on a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    pub id: String,
    pub name: String,
}

impl Reviewer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

/// Per-owner dashboard counters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlogStats {
    pub total_blogs: usize,
    pub saved_blogs: usize,
    pub pending_blogs: usize,
    pub published_blogs: usize,
    pub generated_images: usize,
}

fn newest_first(filter: Expr, order_by: &str, params: PaginationParams) -> Query {
    Query::builder()
        .filter(filter)
        .sort(order_by, SortDirection::Desc)
        .offset(params.offset())
        .limit(params.per_page)
        .build()
}

pub struct BlogRepository<'a, B: StoreBackend> {
    store: &'a DocumentStore<B>,
    config: &'a StoreConfig,
}

impl<'a, B: StoreBackend> BlogRepository<'a, B> {
    pub fn new(store: &'a DocumentStore<B>, config: &'a StoreConfig) -> Self {
        Self { store, config }
    }

    fn blogs(&self) -> TypedCollection<'a, B, Blog> {
        self.store.typed_collection_named(&self.config.blogs_collection)
    }

    fn not_found(&self, id: &str) -> DocumentStoreError {
        DocumentStoreError::DocumentNotFound(id.to_string(), self.config.blogs_collection.clone())
    }

    /// Saves a new blog and returns its id.
    pub async fn create(
        &self,
        owner_id: &str,
        owner_name: &str,
        meta: BsonDocument,
        final_blog: BsonDocument,
    ) -> DocumentStoreResult<String> {
        let id = self.blogs().add(&Blog::new(owner_id, owner_name, meta, final_blog)).await?;

        debug!(blog_id = %id, owner_id, "saved blog");

        Ok(id)
    }

    pub async fn get(&self, id: &str) -> DocumentStoreResult<Option<Record<Blog>>> {
        self.blogs().get(id).await
    }

    /// One page of the owner's blogs, newest first.
    ///
    /// `None` returns the first page of `blog_page_size` blogs.
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        params: Option<&PaginationParams>,
    ) -> DocumentStoreResult<Page<Record<Blog>>> {
        let params = self.config.blog_params(params);

        self.blogs()
            .query(&newest_first(Filter::eq("owner_id", owner_id), "created_at", params))
            .await
    }

    /// Replaces the content and bumps `updated_at`.
    pub async fn update_content(
        &self,
        id: &str,
        meta: BsonDocument,
        final_blog: BsonDocument,
    ) -> DocumentStoreResult<()> {
        self.blogs()
            .update(id, doc! { "meta": meta, "final_blog": final_blog, "updated_at": now() })
            .await
    }

    /// Moves a blog into the review queue.
    ///
    /// # Errors
    ///
    /// `DocumentNotFound` for an unknown id and `InvalidDocument` if it is already
    /// published.
    pub async fn request_publish(&self, id: &str) -> DocumentStoreResult<()> {
        let blog = self.get(id).await?.ok_or_else(|| self.not_found(id))?;

        if blog.document.status == BlogStatus::Published {
            return Err(DocumentStoreError::InvalidDocument(format!("blog {id} is already published")));
        }

        let now = now();

        self.blogs()
            .update(
                id,
                doc! {
                    "status": BlogStatus::Pending,
                    "updated_at": now,
                    "admin_review.requested_at": now,
                    "admin_review.feedback": "",
                },
            )
            .await
    }

    /// The admin queue for `status`, most recently requested first.
    pub async fn review_queue(
        &self,
        status: BlogStatus,
        params: Option<&PaginationParams>,
    ) -> DocumentStoreResult<Page<Record<Blog>>> {
        self.blogs()
            .query(&newest_first(
                Filter::eq("status", status),
                "admin_review.requested_at",
                self.config.blog_params(params),
            ))
            .await
    }

    pub async fn approve(&self, id: &str, reviewer: &Reviewer) -> DocumentStoreResult<()> {
        let now = now();

        self.blogs()
            .update(
                id,
                doc! {
                    "status": BlogStatus::Published,
                    "updated_at": now,
                    "published_at": now,
                    "admin_review.reviewed_at": now,
                    "admin_review.reviewed_by": reviewer.id.as_str(),
                    "admin_review.reviewed_by_name": reviewer.name.as_str(),
                },
            )
            .await?;

        info!(blog_id = id, reviewer = %reviewer.id, "blog approved");

        Ok(())
    }

    pub async fn reject(&self, id: &str, reviewer: &Reviewer, feedback: &str) -> DocumentStoreResult<()> {
        let now = now();

        self.blogs()
            .update(
                id,
                doc! {
                    "status": BlogStatus::Rejected,
                    "updated_at": now,
                    "admin_review.reviewed_at": now,
                    "admin_review.reviewed_by": reviewer.id.as_str(),
                    "admin_review.reviewed_by_name": reviewer.name.as_str(),
                    "admin_review.feedback": feedback,
                },
            )
            .await?;

        info!(blog_id = id, reviewer = %reviewer.id, "blog rejected");

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DocumentStoreResult<()> {
        self.blogs().delete(id).await
    }

    /// Dashboard counters for one owner.
    pub async fn stats(&self, owner_id: &str) -> DocumentStoreResult<BlogStats> {
        let blogs = self.blogs();
        let images = ImageRepository::new(self.store, self.config);

        let owner = Filter::eq("owner_id", owner_id);
        let with_status = |status: BlogStatus| owner.clone().and(Filter::eq("status", status));
        let (saved, pending, published) = (
            with_status(BlogStatus::Saved),
            with_status(BlogStatus::Pending),
            with_status(BlogStatus::Published),
        );

        let (total_blogs, saved_blogs, pending_blogs, published_blogs, generated_images) = try_join!(
            blogs.count(Some(&owner)),
            blogs.count(Some(&saved)),
            blogs.count(Some(&pending)),
            blogs.count(Some(&published)),
            images.count(owner_id, Some(&ImageSource::Nano)),
        )?;

        Ok(BlogStats { total_blogs, saved_blogs, pending_blogs, published_blogs, generated_images })
    }
}

pub struct ImageRepository<'a, B: StoreBackend> {
    store: &'a DocumentStore<B>,
    config: &'a StoreConfig,
}

impl<'a, B: StoreBackend> ImageRepository<'a, B> {
    pub fn new(store: &'a DocumentStore<B>, config: &'a StoreConfig) -> Self {
        Self { store, config }
    }

    fn images(&self) -> TypedCollection<'a, B, Image> {
        self.store.typed_collection_named(&self.config.images_collection)
    }

    /// Records an image for its owner unless the same URL is already saved.
    ///
    /// Returns the id of the new or existing record.
    pub async fn save(
        &self,
        owner_id: &str,
        owner_name: &str,
        image_url: &str,
        meta: BsonDocument,
        source: Option<String>,
    ) -> DocumentStoreResult<String> {
        let images = self.images();
        let existing = images
            .find_one(Filter::eq("owner_id", owner_id).and(Filter::eq("image_url", image_url)))
            .await?;

        if let Some(existing) = existing {
            debug!(image_id = %existing.id, owner_id, "image already saved");
            return Ok(existing.id);
        }

        images
            .add(&Image {
                owner_id: owner_id.to_string(),
                owner_name: owner_name.to_string(),
                image_url: image_url.to_string(),
                meta,
                source,
                created_at: now(),
            })
            .await
    }

    /// One page of the owner's images, newest first. `None` pages by `image_page_size`.
    pub async fn list(
        &self,
        owner_id: &str,
        source: Option<&ImageSource>,
        params: Option<&PaginationParams>,
    ) -> DocumentStoreResult<Page<Record<Image>>> {
        let params = self.config.image_params(params);

        self.images()
            .query(&newest_first(image_filter(owner_id, source), "created_at", params))
            .await
    }

    pub async fn count(&self, owner_id: &str, source: Option<&ImageSource>) -> DocumentStoreResult<usize> {
        self.images().count(Some(&image_filter(owner_id, source))).await
    }

    pub async fn delete(&self, id: &str) -> DocumentStoreResult<()> {
        self.images().delete(id).await
    }
}

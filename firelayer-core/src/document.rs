//! Document representation and serialization.
//!
//! Backends return [`DocumentSnapshot`]s: an opaque, backend-assigned identity plus a
//! schema-less BSON map. Typed records implement [`Document`] and convert to and from
//! snapshots through [`DocumentExt`].

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Reserved order/filter path that refers to the document identity instead of a field.
pub const DOCUMENT_ID: &str = "__name__";

/// A single document read from a collection.
///
/// The identity is assigned by the backend at creation time and never changes. The
/// data map is whatever the writer stored; this layer only interprets the fields a
/// filter or an ordering references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Backend-assigned identity, unique within its collection.
    pub id: String,
    /// The document's fields.
    pub data: BsonDocument,
}

impl DocumentSnapshot {
    /// Creates a snapshot from an identity and its field map.
    pub fn new(id: impl Into<String>, data: BsonDocument) -> Self {
        Self { id: id.into(), data }
    }

    /// Returns the document identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the document's field map.
    pub fn data(&self) -> &BsonDocument {
        &self.data
    }

    /// Resolves a dot-separated path into nested maps.
    ///
    /// `"admin_review.requested_at"` reads `requested_at` inside the `admin_review` map.
    /// Returns `None` when any segment is absent or an intermediate value is not a map.
    pub fn get_path(&self, path: &str) -> Option<&Bson> {
        get_path(&self.data, path)
    }

    /// Returns the value used to order this document by `path`.
    ///
    /// The reserved [`DOCUMENT_ID`] path yields the identity.
    pub fn sort_value(&self, path: &str) -> Option<Bson> {
        if path == DOCUMENT_ID {
            return Some(Bson::String(self.id.clone()));
        }

        self.get_path(path).cloned()
    }
}

/// Resolves a dot-separated path into nested BSON maps.
pub fn get_path<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Core trait for typed records stored in a collection.
///
/// # Example
///
/// ```ignore
/// use firelayer::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Image {
///     pub owner_id: String,
///     pub image_url: String,
/// }
///
/// impl Document for Image {
///     fn collection_name() -> &'static str {
///         "images"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document type lives in.
    fn collection_name() -> &'static str;
}

/// Conversion helpers between typed records and stored field maps.
///
/// Automatically implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Serializes the record into a field map.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the record does not serialize to a map.
    fn to_fields(&self) -> DocumentStoreResult<BsonDocument>;

    /// Deserializes a record from a field map.
    fn from_fields(fields: BsonDocument) -> DocumentStoreResult<Self>;

    /// Deserializes a record from a snapshot, discarding the identity.
    fn from_snapshot(snapshot: DocumentSnapshot) -> DocumentStoreResult<Self> {
        Self::from_fields(snapshot.data)
    }
}

impl<D: Document> DocumentExt for D {
    fn to_fields(&self) -> DocumentStoreResult<BsonDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(fields) => Ok(fields),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a map, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_fields(fields: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(fields))?)
    }
}

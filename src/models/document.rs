//! Report metadata records as published by the listing endpoint.
//!
//! The listing item is kept as an untyped JSON value: its shape is owned by
//! the publisher, and the record is hashed and stored exactly as received
//! apart from the provenance fields added here.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::storage::content::{
    canonical_json, content_hash, derive_filename, sanitize_alnum, sanitize_date, DOCUMENTS_DIR,
    FILES_DIR, IMAGES_QUALIFIER,
};

/// Declared type of a downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatType {
    Pdf,
    Html,
    Other(String),
}

impl FormatType {
    pub fn from_declared(s: &str) -> Self {
        match s {
            "PDF" => Self::Pdf,
            "HTML" => Self::Html,
            other => Self::Other(other.to_string()),
        }
    }

    /// File extension for this type, `None` for unrecognized types.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Pdf => Some("pdf"),
            Self::Html => Some("html"),
            Self::Other(_) => None,
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, Self::Html)
    }
}

/// One retrievable file of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub format_type: FormatType,
    /// Path of the file relative to the publisher's site root.
    pub url: String,
}

/// Provenance recorded on a format after it has been fetched.
///
/// Serialized under the `_` key of the format entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatProvenance {
    pub encoding: Option<String>,
    /// Final URL after redirects.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub sha256: String,
    pub filename: String,
    /// In-page image path → stored filename. HTML formats only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<BTreeMap<String, String>>,
}

/// A report metadata record from the listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    item: Value,
}

impl Document {
    pub fn new(item: Value) -> Self {
        Self { item }
    }

    fn field(&self, name: &'static str) -> Result<&str> {
        self.item
            .get(name)
            .and_then(Value::as_str)
            .ok_or(Error::MissingField(name))
    }

    /// Product number exactly as published.
    pub fn product_number(&self) -> Result<&str> {
        self.field("ProductNumber")
    }

    /// Product number with everything but letters and digits removed.
    pub fn product_id(&self) -> Result<String> {
        Ok(sanitize_alnum(self.product_number()?))
    }

    /// Cover date reduced to `YYYYMMDD`.
    pub fn report_date(&self) -> Result<String> {
        Ok(sanitize_date(self.field("CoverDate")?))
    }

    /// Hash of the canonical JSON of the record as received.
    pub fn metadata_hash(&self) -> String {
        content_hash(&canonical_json(&self.item))
    }

    /// `documents/<date8>_<productId>_<hash>.json`
    pub fn metadata_filename(&self) -> Result<String> {
        let date = self.report_date()?;
        let product_id = self.product_id()?;
        Ok(derive_filename(
            DOCUMENTS_DIR,
            &[&date, &product_id],
            &self.metadata_hash(),
            Some("json"),
        ))
    }

    /// `files/<date8>_<ProductNumber>_<hash>[.<ext>]`
    pub fn file_filename(&self, hash: &str, format_type: &FormatType) -> Result<String> {
        let date = self.report_date()?;
        Ok(derive_filename(
            FILES_DIR,
            &[&date, self.product_number()?],
            hash,
            format_type.extension(),
        ))
    }

    /// `files/<date8>_<ProductNumber>_images_<hash>.png`
    pub fn image_filename(&self, hash: &str) -> Result<String> {
        let date = self.report_date()?;
        Ok(derive_filename(
            FILES_DIR,
            &[&date, self.product_number()?, IMAGES_QUALIFIER],
            hash,
            Some("png"),
        ))
    }

    fn format_list(&self) -> Result<&Vec<Value>> {
        self.item
            .get("FormatList")
            .and_then(Value::as_array)
            .ok_or(Error::MissingField("FormatList"))
    }

    /// Formats in listing order.
    pub fn formats(&self) -> Result<Vec<Format>> {
        self.format_list()?
            .iter()
            .map(|entry| {
                let format_type = entry
                    .get("FormatType")
                    .and_then(Value::as_str)
                    .ok_or(Error::MissingField("FormatType"))?;
                let url = entry
                    .get("Url")
                    .and_then(Value::as_str)
                    .ok_or(Error::MissingField("Url"))?;
                Ok(Format {
                    format_type: FormatType::from_declared(format_type),
                    url: url.to_string(),
                })
            })
            .collect()
    }

    /// Attach provenance to the format at `index` under its `_` key.
    pub fn attach_provenance(&mut self, index: usize, provenance: &FormatProvenance) -> Result<()> {
        let entry = self
            .item
            .get_mut("FormatList")
            .and_then(Value::as_array_mut)
            .and_then(|list| list.get_mut(index))
            .and_then(Value::as_object_mut)
            .ok_or(Error::MissingField("FormatList"))?;
        entry.insert("_".to_string(), serde_json::to_value(provenance)?);
        Ok(())
    }

    /// Stamp the record with the time it was fetched.
    pub fn mark_fetched(&mut self, at: DateTime<Utc>) -> Result<()> {
        let obj: &mut Map<String, Value> = self
            .item
            .as_object_mut()
            .ok_or(Error::MissingField("SearchResults item"))?;
        obj.insert(
            "_fetched".to_string(),
            Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        Ok(())
    }

    /// Pretty-printed JSON of the (decorated) record.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.item)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.item
    }
}

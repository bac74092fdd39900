//! Requirement records, embedding entries and query filters
//!
//! A `RequirementRecord` is one row extracted from an uploaded spreadsheet (or one
//! text chunk of a document). An `EmbeddingEntry` carries a denormalized copy of the
//! record's display fields so the ranker never has to join back to the records.

mod clean;

pub use clean::{clean_for_display, clean_requirement_text, strip_unnamed};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum length of a requirement once cleaned and trimmed; shorter rows are
/// never stored
pub const MIN_REQUIREMENT_CHARS: usize = 3;

/// Whether `text` still carries a requirement after column labels are stripped
pub fn is_usable_requirement(text: &str) -> bool {
    clean_requirement_text(text).trim().chars().count() >= MIN_REQUIREMENT_CHARS
}

/// Product used when a row carries none
pub const DEFAULT_PRODUCT: &str = "General";

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// Free text that does not match a known label
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                let trimmed = value.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($label) {
                        return Self::$variant;
                    }
                )+
                Self::Other(trimmed.to_string())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum!(
    /// Priority the issuing bank attached to a requirement
    RequirementCategory {
        MustHave => "Must Have",
        Critical => "Critical",
        GoodToHave => "Good to Have",
    }
);

labelled_enum!(
    /// How the vendor answers a requirement
    ResponseCategory {
        ReadilyAvailable => "Readily Available",
        Configuration => "Configuration",
        Customization => "Customization",
        NotAvailable => "Not Available",
    }
);

labelled_enum!(
    /// Implementation effort estimate
    EffortRequired {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Considerable => "Considerable",
    }
);

impl Default for RequirementCategory {
    fn default() -> Self {
        Self::MustHave
    }
}

impl Default for ResponseCategory {
    fn default() -> Self {
        Self::ReadilyAvailable
    }
}

/// Display fields of a requirement, copied verbatim into every embedding entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub product: String,
    pub requirement: String,
    pub requirement_category: RequirementCategory,
    pub response_category: ResponseCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_required: Option<EffortRequired>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub sheet_name: String,
    pub file_name: String,
    pub rfp_name: String,
    pub bank_name: String,
    pub date: DateTime<Utc>,
}

/// One stored requirement row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRecord {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub fields: RecordMetadata,
}

impl RequirementRecord {
    /// Text handed to the embedding backend for this record
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {}: {}",
            self.fields.product, self.fields.requirement_category, self.fields.requirement
        )
    }
}

/// Vector association for a record or document chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    pub entry_id: String,
    pub document_id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingEntry {
    pub fn for_record(record: &RequirementRecord, vector: Vec<f32>) -> Self {
        Self {
            entry_id: record.id.clone(),
            document_id: record.document_id.clone(),
            vector,
            metadata: record.fields.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Hard pre-filter applied before any similarity scoring
///
/// An empty set means "no restriction" for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub response_categories: Vec<String>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.response_categories.is_empty()
    }

    /// Exact-match membership test over product and response category
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        let product_ok =
            self.products.is_empty() || self.products.iter().any(|p| *p == metadata.product);
        let category_ok = self.response_categories.is_empty()
            || self
                .response_categories
                .iter()
                .any(|c| c == metadata.response_category.as_str());
        product_ok && category_ok
    }
}

/// Document-level provenance shared by all rows of one upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub file_name: String,
    #[serde(default = "unknown_rfp")]
    pub rfp_name: String,
    #[serde(default = "unknown_bank")]
    pub bank_name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn unknown_rfp() -> String {
    "Unknown RFP".to_string()
}

fn unknown_bank() -> String {
    "Unknown Bank".to_string()
}

/// Raw spreadsheet row as produced by the upload/column-mapping layer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowDraft {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub requirement: Option<String>,
    #[serde(default)]
    pub requirement_category: Option<String>,
    #[serde(default)]
    pub response_category: Option<String>,
    #[serde(default)]
    pub effort_required: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl RowDraft {
    /// Turn a draft row into a record, or `None` when the cleaned requirement
    /// is shorter than `MIN_REQUIREMENT_CHARS`.
    pub fn into_record(self, document: &DocumentInfo) -> Option<RequirementRecord> {
        let requirement = non_empty(self.requirement.as_ref())?;
        if !is_usable_requirement(&requirement) {
            return None;
        }

        let fields = RecordMetadata {
            product: non_empty(self.product.as_ref()).unwrap_or_else(|| DEFAULT_PRODUCT.into()),
            requirement,
            requirement_category: non_empty(self.requirement_category.as_ref())
                .map(RequirementCategory::from)
                .unwrap_or_default(),
            response_category: non_empty(self.response_category.as_ref())
                .map(ResponseCategory::from)
                .unwrap_or_default(),
            effort_required: non_empty(self.effort_required.as_ref()).map(EffortRequired::from),
            comments: non_empty(self.comments.as_ref()),
            sheet_name: non_empty(self.sheet_name.as_ref()).unwrap_or_else(|| "Sheet1".into()),
            file_name: document.file_name.clone(),
            rfp_name: document.rfp_name.clone(),
            bank_name: document.bank_name.clone(),
            date: self.date.unwrap_or_else(Utc::now),
        };

        Some(RequirementRecord {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            fields,
        })
    }
}

/// One uploaded document and its extracted rows, as accepted by `ingest`
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub file_name: String,
    #[serde(default = "unknown_rfp")]
    pub rfp_name: String,
    #[serde(default = "unknown_bank")]
    pub bank_name: String,
    #[serde(default)]
    pub rows: Vec<RowDraft>,
}

impl DocumentUpload {
    /// Assign a document id and convert rows, dropping empty ones
    pub fn into_parts(self) -> (DocumentInfo, Vec<RequirementRecord>) {
        let document = DocumentInfo {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: self.file_name,
            rfp_name: self.rfp_name,
            bank_name: self.bank_name,
            created_at: Utc::now(),
        };
        let records = self
            .rows
            .into_iter()
            .filter_map(|row| row.into_record(&document))
            .collect();
        (document, records)
    }
}

#[cfg(test)]
pub(crate) fn sample_metadata(product: &str, requirement: &str) -> RecordMetadata {
    RecordMetadata {
        product: product.to_string(),
        requirement: requirement.to_string(),
        requirement_category: RequirementCategory::MustHave,
        response_category: ResponseCategory::ReadilyAvailable,
        effort_required: None,
        comments: None,
        sheet_name: "Sheet1".to_string(),
        file_name: "rfp.xlsx".to_string(),
        rfp_name: "Core Banking RFP".to_string(),
        bank_name: "Acme Bank".to_string(),
        date: Utc::now(),
    }
}

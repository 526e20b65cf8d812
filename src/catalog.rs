//! Document Catalog
//!
//! In-memory list of the documents shown on the dashboard grid, together
//! with the viewer's presentation preferences. The search query is kept so
//! the client can echo it back, but listing does not filter on it yet.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub file_type: String,
    pub thumbnail_url: String,
    pub last_modified: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentCatalog {
    documents: Vec<DocumentRecord>,
    view_mode: ViewMode,
    search_query: String,
}

impl DocumentCatalog {
    pub fn new(documents: Vec<DocumentRecord>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    /// The fixed records the dashboard ships with.
    pub fn with_sample_documents() -> Self {
        let record = |id: &str, title: &str, file_type: &str, photo: &str, (y, m, d): (i32, u32, u32)| {
            DocumentRecord {
                id: id.to_string(),
                title: title.to_string(),
                file_type: file_type.to_string(),
                thumbnail_url: format!("https://images.unsplash.com/{}?w=300&q=80", photo),
                last_modified: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            }
        };

        Self::new(vec![
            record("doc-1", "Project Proposal", "PDF", "photo-1568602471122-7832951cc4c5", (2023, 9, 15)),
            record("doc-2", "Financial Report", "XLSX", "photo-1554224155-6726b3ff858f", (2023, 9, 10)),
            record("doc-3", "Marketing Strategy", "DOCX", "photo-1551836022-d5d88e9218df", (2023, 9, 5)),
            record("doc-4", "Client Presentation", "PPTX", "photo-1542744173-8e7e53415bb0", (2023, 8, 28)),
            record("doc-5", "Team Photo", "JPG", "photo-1522071820081-009f0129c71c", (2023, 8, 20)),
        ])
    }

    /// All records. The search query is not applied.
    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.view_mode = self.view_mode.toggled();
        self.view_mode
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }
}

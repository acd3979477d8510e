//! Shared fixtures for the leasedoc integration tests.

#![allow(dead_code)]

use leasedoc::{
    memory::InMemoryStore,
    prelude::*,
};
use serde::{Deserialize, Serialize};

pub const SUBSCRIPTION: &str = "sub-1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDocument {
    pub id: String,
    #[serde(default)]
    pub infra_id: Option<String>,
    #[serde(default)]
    pub counter: i64,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<VersionToken>,
}

impl Document for ClusterDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        "OpenShiftClusters"
    }

    fn version_token(&self) -> Option<&VersionToken> {
        self.etag.as_ref()
    }

    fn set_version_token(&mut self, token: VersionToken) {
        self.etag = Some(token);
    }
}

pub fn cluster(id: &str) -> ClusterDocument {
    ClusterDocument {
        id: id.to_string(),
        infra_id: None,
        counter: 0,
        created_by: None,
        etag: None,
    }
}

/// Same content, ignoring the version token.
pub fn same_content(a: &ClusterDocument, b: &ClusterDocument) -> bool {
    ClusterDocument { etag: None, ..a.clone() } == ClusterDocument { etag: None, ..b.clone() }
}

pub fn store() -> (InMemoryStore, DocumentStore) {
    let backend = InMemoryStore::new();
    (backend.clone(), DocumentStore::new(backend))
}

pub fn by_id(docs: &mut [ClusterDocument]) {
    docs.sort_by(|a, b| a.id.cmp(&b.id));
}

pub fn ids(docs: &[ClusterDocument]) -> Vec<&str> {
    docs.iter().map(|d| d.id.as_str()).collect()
}

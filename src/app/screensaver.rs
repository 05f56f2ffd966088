use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::AppContext;
use crate::ajax::{Callbacks, RequestError, RequestHandle, RequestOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoCollection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryFilter {
    pub property: String,
    pub value: String,
}

/// Photo query issued by the host screensaver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhotoQuery {
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub length: Option<u32>,
}

impl PhotoQuery {
    pub fn collection_id(&self) -> Option<&str> {
        self.filters
            .iter()
            .find(|filter| filter.property == "id")
            .map(|filter| filter.value.as_str())
    }
}

/// The single collection offered to the screensaver picker.
pub fn selection_entry() -> PhotoCollection {
    PhotoCollection {
        id: "screensaver-photos".into(),
        name: "Popular".into(),
        kind: "collection".into(),
    }
}

impl AppContext {
    /// Fetches the photo list for `query` and hands the parsed JSON to
    /// `on_photos`. Failures are only logged.
    pub fn execute_photo_query(
        &self,
        photos_url: &str,
        query: &PhotoQuery,
        on_photos: impl FnOnce(Value) + 'static,
    ) -> Result<RequestHandle, RequestError> {
        tracing::info!(
            target: "app",
            id = query.collection_id().unwrap_or("none"),
            shuffle = query.shuffle,
            length = query.length.unwrap_or_default(),
            "photo batch query"
        );

        let mut on_photos = Some(on_photos);
        let hooks = Callbacks::new()
            .on_success(move |response| match response.json::<Value>() {
                Ok(photos) => {
                    if let Some(on_photos) = on_photos.take() {
                        on_photos(photos);
                    }
                }
                Err(err) => {
                    tracing::warn!(target: "app", error = %err, "photo list is not valid JSON");
                }
            })
            .on_failure(|status, _| {
                tracing::warn!(target: "app", status, "photo list request failed");
            });
        self.requests().issue(RequestOptions::new(photos_url), hooks)
    }
}

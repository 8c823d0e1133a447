//! Memoized image loading
//!
//! Loads are keyed by URI. Concurrent requests for one URI share a single
//! in-flight future; a failed load is retried once against the placeholder
//! image. Only a failing placeholder is an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dq_core::{DrawError, DrawResult};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::RendererConfig;

/// Built-in placeholder: a small GIF showing a broken image
pub const PLACEHOLDER_IMAGE_URI: &str = "data:image/gif;base64,R0lGODlhHgAeAKIAAAAAmWZmmZnM/////8zMzGZmZgAAAAAAACwAAAAAHgAeAEADimi63P5ryAmEqHfqPRWfRQF+nEeeqImum0oJQxUThGaQ7hSs95ezvB4Q+BvihBSAclk6fgKiAkE0kE6RNqwkUBtMa1OpVlI0lsbmFjrdWbMH5Tdcu6wbf7J8YM9H4y0YAE0+dHVKIV0Efm5VGiEpY1A0UVMSBYtPGl1eNZhnEBGEck6jZ6WfoKmgCQA7";

/// A decoded image as seen by the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Source URI
    pub uri: String,
    /// Natural width in pixels
    pub width: f64,
    /// Natural height in pixels
    pub height: f64,
}

/// Backend that fetches and decodes images
pub trait ImageLoader: Send + Sync {
    /// Load `uri`. The error is a human-readable reason.
    fn load(&self, uri: &str) -> BoxFuture<'static, Result<Image, String>>;
}

type SharedLoad = Shared<BoxFuture<'static, DrawResult<Arc<Image>>>>;

/// URI-keyed image memo
pub struct ImageCache {
    loader: Arc<dyn ImageLoader>,
    placeholder: String,
    loads: Mutex<HashMap<String, SharedLoad>>,
}

impl ImageCache {
    /// Cache using the built-in placeholder
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        Self::with_placeholder(loader, PLACEHOLDER_IMAGE_URI)
    }

    /// Cache with a custom placeholder URI
    pub fn with_placeholder(loader: Arc<dyn ImageLoader>, placeholder: impl Into<String>) -> Self {
        Self {
            loader,
            placeholder: placeholder.into(),
            loads: Mutex::new(HashMap::new()),
        }
    }

    /// Cache using the placeholder configured in `config`
    pub fn from_config(loader: Arc<dyn ImageLoader>, config: &RendererConfig) -> Self {
        Self::with_placeholder(loader, config.placeholder_image.clone())
    }

    /// Placeholder URI drawn for failed loads
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Load `uri`, joining an in-flight or finished load when there is one
    pub fn load(&self, uri: &str) -> SharedLoad {
        let mut loads = self.loads.lock();
        if let Some(load) = loads.get(uri) {
            debug!(uri, "image load shared");
            return load.clone();
        }
        let load = fetch(self.loader.clone(), uri.to_string(), self.placeholder.clone())
            .boxed()
            .shared();
        loads.insert(uri.to_string(), load.clone());
        load
    }

    /// Number of URIs seen
    pub fn len(&self) -> usize {
        self.loads.lock().len()
    }

    /// Whether nothing was requested yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every memoized load
    pub fn clear(&self) {
        self.loads.lock().clear();
    }
}

impl fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("placeholder", &self.placeholder)
            .field("loads", &self.len())
            .finish()
    }
}

async fn fetch(
    loader: Arc<dyn ImageLoader>,
    uri: String,
    placeholder: String,
) -> DrawResult<Arc<Image>> {
    match loader.load(&uri).await {
        Ok(image) => Ok(Arc::new(image)),
        Err(reason) if uri == placeholder => Err(DrawError::ImageLoad { uri, reason }),
        Err(reason) => {
            warn!(%uri, %reason, "image load failed, drawing placeholder");
            loader
                .load(&placeholder)
                .await
                .map(Arc::new)
                .map_err(|reason| DrawError::ImageLoad {
                    uri: placeholder,
                    reason,
                })
        }
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashSet;

    use super::*;
    use futures::future::ready;

    /// In-memory loader: every URI loads as a 30×30 image unless marked
    /// as failing. Records each load request.
    #[derive(Debug, Default)]
    pub struct MemoryLoader {
        pub failing: HashSet<String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MemoryLoader {
        pub fn failing(uris: &[&str]) -> Self {
            Self {
                failing: uris.iter().map(|u| u.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl ImageLoader for MemoryLoader {
        fn load(&self, uri: &str) -> BoxFuture<'static, Result<Image, String>> {
            self.requests.lock().push(uri.to_string());
            let result = if self.failing.contains(uri) {
                Err(format!("no such image: {uri}"))
            } else {
                Ok(Image {
                    uri: uri.to_string(),
                    width: 30.0,
                    height: 30.0,
                })
            };
            ready(result).boxed()
        }
    }
}

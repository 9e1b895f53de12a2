//! Static-file route constructor.

use std::path::PathBuf;

use hyper::StatusCode;

use crate::error::Result;
use crate::http::render::mime_for_path;
use crate::http::response;
use crate::routing::route::{handler, ContentMode, Outcome, Route};

/// Extensions probed, in order, when resolving a request to a file on disk.
const PROBE_EXTENSIONS: [&str; 4] = ["", ".htm", ".html", ".shtml"];

/// Route serving files from one or more directories.
///
/// The portion of the request path beyond `prefix` is resolved against each
/// directory in turn, probing the extension list, and the first hit is
/// served. Traversal segments in the request are rejected with 404.
pub fn static_files(
    prefix: &str,
    directories: impl IntoIterator<Item = impl Into<PathBuf>>,
) -> Result<Route> {
    let prefix_owned = prefix.to_string();
    let dirs: Vec<PathBuf> = directories.into_iter().map(Into::into).collect();

    Route::new(
        prefix,
        handler(move |req| {
            let prefix = prefix_owned.clone();
            let dirs = dirs.clone();
            async move {
                let filename = req.path().get(prefix.len()..).unwrap_or("").to_string();
                if filename.contains("..") {
                    return Outcome::Rendered(String::new(), StatusCode::NOT_FOUND);
                }
                for dir in &dirs {
                    for ext in PROBE_EXTENSIONS {
                        let candidate = dir.join(format!("{filename}{ext}"));
                        match tokio::fs::read(&candidate).await {
                            Ok(data) => {
                                let mime = mime_for_path(&candidate.to_string_lossy());
                                return Outcome::Written(response::with_content_type(
                                    StatusCode::OK,
                                    mime,
                                    data,
                                ));
                            }
                            Err(_) => continue,
                        }
                    }
                }
                Outcome::Rendered(String::new(), StatusCode::NOT_FOUND)
            }
        }),
        ContentMode::Auto,
    )
}

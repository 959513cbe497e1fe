use axum::http::{Method, Uri};

use crate::error::{Error, ErrorDetails};

/// Fallback for every mock service. The query string is left out of the message.
pub async fn handle_404(method: Method, uri: Uri) -> Error {
    Error::new(ErrorDetails::RouteNotFound {
        path: uri.path().to_string(),
        method: method.to_string(),
    })
}

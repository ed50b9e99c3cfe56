// SPDX-License-Identifier: GPL-3.0-only
pub mod path_sanitizer;
pub mod url_validator;

pub use path_sanitizer::{blob_path, sanitize_blob_key};
pub use url_validator::validate_backend_url;

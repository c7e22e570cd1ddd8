//! NationBuilder endpoint families.
//!
//! Thin typed wrappers over the client's resource operations. Identifiers are
//! checked before any request is built; a bad one completes the operation at once
//! with `InvalidArgument` and no handle is returned.

/// Unwraps a local result or reports the error to the completion and returns `None`.
macro_rules! or_complete {
    ($result:expr, $completion:ident) => {
        match $result {
            Ok(value) => value,
            Err(error) => {
                $completion(Err(error));
                return None;
            }
        }
    };
}

mod contacts;
mod donations;
mod lists;
mod people;
mod sites;
mod surveys;
mod tags;

pub use contacts::*;
pub use donations::*;
pub use lists::*;
pub use people::*;
pub use sites::*;
pub use surveys::*;
pub use tags::*;

use crate::errors::{NationBuilderError, NationBuilderResult};
use crate::query::{Params, QueryCodec};
use crate::request::params_from;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Renders `value` and checks it is a numeric identifier.
pub(crate) fn identifier(value: impl fmt::Display, name: &str) -> NationBuilderResult<String> {
    let value = value.to_string();
    if QueryCodec::is_numeric(&value) {
        Ok(value)
    } else {
        Err(NationBuilderError::invalid_argument(format!(
            "{} must be numeric, got '{}'",
            name, value
        )))
    }
}

/// Checks a free-form path segment such as a tag name or site slug.
pub(crate) fn segment(value: &str, name: &str) -> NationBuilderResult<String> {
    if value.trim().is_empty() || value.contains('/') {
        return Err(NationBuilderError::invalid_argument(format!(
            "{} must be a non-empty path segment",
            name
        )));
    }
    Ok(value.to_string())
}

/// Wraps a serializable resource as `{key: resource}`.
pub(crate) fn wrapped<T: Serialize + ?Sized>(key: &str, resource: &T) -> NationBuilderResult<Params> {
    let mut params = Params::new();
    params.insert(key.to_string(), Value::Object(params_from(resource)?));
    Ok(params)
}

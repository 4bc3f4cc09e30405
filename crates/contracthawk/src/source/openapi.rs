//! OpenAPI / Swagger document parsing into endpoint records.
//!
//! Only the operation list is read: path, method, summary/description and
//! the deprecation flag. Schemas, parameters and security are ignored.

use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::SourceError;
use crate::sync::model::{EndpointRecord, HttpMethod};

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    openapi: Option<IgnoredAny>,
    #[serde(default)]
    swagger: Option<IgnoredAny>,
    #[serde(default)]
    paths: Option<OrderedPaths>,
}

/// `paths` entries in document order.
#[derive(Debug, Default)]
struct OrderedPaths(Vec<(String, PathItem)>);

impl<'de> Deserialize<'de> for OrderedPaths {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PathsVisitor;

        impl<'de> Visitor<'de> for PathsVisitor {
            type Value = OrderedPaths;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of paths to path items")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(key) = map.next_key::<String>()? {
                    // Only `/...` keys are path items; `x-` extensions and the like are skipped.
                    if key.starts_with('/') {
                        let item = map.next_value::<PathItem>()?;
                        entries.push((key, item));
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(OrderedPaths(entries))
            }
        }

        deserializer.deserialize_map(PathsVisitor)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PathItem {
    #[serde(default)]
    get: Option<Operation>,
    #[serde(default)]
    post: Option<Operation>,
    #[serde(default)]
    put: Option<Operation>,
    #[serde(default)]
    patch: Option<Operation>,
    #[serde(default)]
    delete: Option<Operation>,
}

impl PathItem {
    fn operations(self) -> impl Iterator<Item = (HttpMethod, Operation)> {
        [
            (HttpMethod::Get, self.get),
            (HttpMethod::Post, self.post),
            (HttpMethod::Put, self.put),
            (HttpMethod::Patch, self.patch),
            (HttpMethod::Delete, self.delete),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.map(|op| (method, op)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct Operation {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    deprecated: Option<bool>,
}

impl Operation {
    /// Non-blank summary, else non-blank description.
    fn human_description(&self) -> Option<String> {
        [&self.summary, &self.description]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
            .cloned()
    }
}

/// Parses a JSON or YAML OpenAPI/Swagger document.
///
/// Endpoints come out in document order: paths as listed, and within a path
/// GET, POST, PUT, PATCH, DELETE.
pub fn parse_document(content: &str) -> Result<Vec<EndpointRecord>, SourceError> {
    let document: Document = if content.trim_start().starts_with('{') {
        serde_json::from_str(content)
            .map_err(|e| SourceError::Parse(format!("invalid JSON document: {}", e)))?
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| SourceError::Parse(format!("invalid YAML document: {}", e)))?
    };

    if document.openapi.is_none() && document.swagger.is_none() {
        return Err(SourceError::Parse(
            "document has no 'openapi' or 'swagger' version field".to_string(),
        ));
    }

    let mut endpoints = Vec::new();
    for (path, item) in document.paths.unwrap_or_default().0 {
        for (method, operation) in item.operations() {
            endpoints.push(EndpointRecord {
                description: operation.human_description(),
                deprecated: operation.deprecated.unwrap_or(false),
                ..EndpointRecord::new(method, path.clone())
            });
        }
    }
    Ok(endpoints)
}

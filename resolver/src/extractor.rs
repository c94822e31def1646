//! Ranked ways of reading a message id off a rendered element.
//!
//! The default ranking is: explicit attribute, framework instance data, handler source text.
//! The positional fallback lives in the resolver since it needs the whole snapshot.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::element::MessageElement;

/// Attribute carrying the message id when the host renders one.
pub const MESSAGE_ID_ATTRIBUTE: &str = "data-message-id";

/// Field paths under which framework instance data has been seen to hold the message id.
pub const FRAMEWORK_ID_PATHS: &[&[&str]] = &[
    &["messageId"],
    &["message", "id"],
    &["props", "message", "id"],
    &["memoizedProps", "message", "id"],
    &["children", "props", "message", "id"],
];

pub trait IdentityExtractor<E: MessageElement>: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, element: &E) -> Option<String>;
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reads an id attribute from the element or its nearest ancestor that has one.
#[derive(Debug, Clone)]
pub struct AttributeExtractor {
    attribute: String,
}

impl AttributeExtractor {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }
}

impl Default for AttributeExtractor {
    fn default() -> Self {
        Self::new(MESSAGE_ID_ATTRIBUTE)
    }
}

impl<E: MessageElement> IdentityExtractor<E> for AttributeExtractor {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn extract(&self, element: &E) -> Option<String> {
        let mut current = Some(element.clone());
        while let Some(node) = current {
            if let Some(id) = non_blank(node.attribute(&self.attribute)) {
                return Some(id);
            }
            current = node.parent();
        }
        None
    }
}

/// Searches framework instance data on the element and up to `max_hops` ancestors.
#[derive(Debug, Clone)]
pub struct FrameworkDataExtractor {
    max_hops: usize,
}

impl FrameworkDataExtractor {
    pub fn new(max_hops: usize) -> Self {
        Self { max_hops }
    }

    fn lookup(data: &Value) -> Option<String> {
        FRAMEWORK_ID_PATHS.iter().find_map(|path| {
            let value = path.iter().try_fold(data, |v, key| v.get(*key))?;
            match value {
                Value::String(s) => non_blank(Some(s.clone())),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        })
    }
}

impl<E: MessageElement> IdentityExtractor<E> for FrameworkDataExtractor {
    fn name(&self) -> &'static str {
        "framework-data"
    }

    fn extract(&self, element: &E) -> Option<String> {
        let mut current = Some(element.clone());
        for _ in 0..=self.max_hops {
            let node = current?;
            if let Some(id) = node.framework_data().as_ref().and_then(Self::lookup) {
                return Some(id);
            }
            current = node.parent();
        }
        None
    }
}

fn uuid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
                .ok()
        })
        .as_ref()
}

/// Last resort: the first UUID embedded in a neighboring control's handler source.
#[derive(Debug, Clone, Default)]
pub struct HandlerSourceExtractor;

impl<E: MessageElement> IdentityExtractor<E> for HandlerSourceExtractor {
    fn name(&self) -> &'static str {
        "handler-source"
    }

    fn extract(&self, element: &E) -> Option<String> {
        let pattern = uuid_pattern()?;
        element.handler_sources().iter().find_map(|source| {
            pattern
                .find_iter(source)
                .find(|m| Uuid::parse_str(m.as_str()).is_ok())
                .map(|m| m.as_str().to_string())
        })
    }
}

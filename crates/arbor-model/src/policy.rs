use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{PropertyDescriptor, PropertyKind, TypeDescriptor};

/// Knobs for structural comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonPolicy {
    /// When `false`, string properties that differ only in case are equal.
    pub case_sensitive: bool,
    /// Skip subtrees whose content ids match on both sides.
    pub skip_unchanged_subtrees: bool,
    /// Properties never reported as changed, as `"Property"` (any type) or
    /// `"Type.Property"`.
    pub ignored_properties: Vec<String>,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            skip_unchanged_subtrees: true,
            ignored_properties: Vec::new(),
        }
    }
}

impl ComparisonPolicy {
    /// Returns `true` if `property` of `type_name` is left out of comparisons.
    pub fn ignores(&self, type_name: &str, property: &str) -> bool {
        self.ignored_properties.iter().any(|rule| match rule.split_once('.') {
            Some((t, p)) => t == type_name && p == property,
            None => rule == property,
        })
    }

    /// Declared properties of `descriptor` that take part in comparison,
    /// in declaration order.
    pub fn comparable_properties<'a>(
        &'a self,
        descriptor: &'a TypeDescriptor,
    ) -> impl Iterator<Item = &'a PropertyDescriptor> + 'a {
        descriptor
            .properties
            .iter()
            .filter(move |p| !self.ignores(&descriptor.name, &p.name))
    }

    /// Compare two values of `kind` under this policy.
    pub fn values_equal(&self, kind: PropertyKind, a: &Value, b: &Value) -> bool {
        match (kind, a, b) {
            (PropertyKind::String, Value::String(x), Value::String(y)) if !self.case_sensitive => {
                x.to_lowercase() == y.to_lowercase()
            }
            _ => a == b,
        }
    }
}

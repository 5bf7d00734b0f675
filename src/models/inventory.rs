//! Inventory API payloads: devices, attributes, groups and filters.

use super::common::lenient_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scope of a device attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeScope {
    Identity,
    #[default]
    Inventory,
    System,
    Tags,
}

/// A named, scoped device attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttribute {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub scope: AttributeScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DeviceAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>, scope: AttributeScope) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            scope,
            description: None,
        }
    }
}

/// A device as reported by the inventory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<DeviceAttribute>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_ts: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_ts: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub check_in_time: Option<DateTime<Utc>>,
}

impl Device {
    /// Finds an attribute by name, optionally restricted to one scope.
    pub fn attribute(&self, name: &str, scope: Option<AttributeScope>) -> Option<&DeviceAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name && scope.map_or(true, |s| attr.scope == s))
    }

    /// Returns an attribute value by name.
    pub fn attribute_value(&self, name: &str, scope: Option<AttributeScope>) -> Option<&Value> {
        self.attribute(name, scope).map(|attr| &attr.value)
    }

    /// Returns the attributes in the `tags` scope.
    pub fn tags(&self) -> Vec<&DeviceAttribute> {
        self.attributes
            .iter()
            .filter(|attr| attr.scope == AttributeScope::Tags)
            .collect()
    }
}

/// A device group.
///
/// The groups endpoint returns either bare names or objects; both forms
/// deserialize into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GroupRepr")]
pub struct Group {
    pub name: String,
    pub device_count: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        device_count: u64,
    },
}

impl From<GroupRepr> for Group {
    fn from(repr: GroupRepr) -> Self {
        match repr {
            GroupRepr::Name(name) => Group {
                name,
                device_count: 0,
            },
            GroupRepr::Full { name, device_count } => Group { name, device_count },
        }
    }
}

/// Search operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "$eq")]
    Equal,
    #[serde(rename = "$ne")]
    NotEqual,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    NotIn,
    #[serde(rename = "$exists")]
    Exists,
    #[serde(rename = "$regex")]
    Regex,
    #[serde(rename = "$gt")]
    GreaterThan,
    #[serde(rename = "$gte")]
    GreaterThanOrEqual,
    #[serde(rename = "$lt")]
    LessThan,
    #[serde(rename = "$lte")]
    LessThanOrEqual,
}

/// A single search condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub attribute: String,
    #[serde(default)]
    pub scope: AttributeScope,
    #[serde(rename = "type")]
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterPredicate {
    pub fn new(
        attribute: impl Into<String>,
        scope: AttributeScope,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            scope,
            operator,
            value: value.into(),
        }
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<Value>, scope: AttributeScope) -> Self {
        Self::new(attribute, scope, FilterOperator::Equal, value)
    }

    pub fn not_equals(
        attribute: impl Into<String>,
        value: impl Into<Value>,
        scope: AttributeScope,
    ) -> Self {
        Self::new(attribute, scope, FilterOperator::NotEqual, value)
    }

    /// Substring match, expressed as a `$regex` predicate.
    pub fn contains(attribute: impl Into<String>, needle: &str, scope: AttributeScope) -> Self {
        Self::new(attribute, scope, FilterOperator::Regex, format!(".*{}.*", needle))
    }

    pub fn exists(attribute: impl Into<String>, exists: bool, scope: AttributeScope) -> Self {
        Self::new(attribute, scope, FilterOperator::Exists, exists)
    }

    pub fn in_list(attribute: impl Into<String>, values: Vec<Value>, scope: AttributeScope) -> Self {
        Self::new(attribute, scope, FilterOperator::In, values)
    }
}

/// A conjunction of predicates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterDefinition {
    pub predicates: Vec<FilterPredicate>,
}

impl FilterDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, predicate: FilterPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// Sort criterion of a device search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSort {
    pub attribute: String,
    pub scope: AttributeScope,
    pub order: super::SortOrder,
}

/// Body of `POST filters/search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSearchFilter {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "flatten_filters")]
    pub filters: Vec<FilterDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SearchSort>,
}

impl Default for DeviceSearchFilter {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: crate::pagination::DEFAULT_PER_PAGE,
            filters: Vec::new(),
            sort: Vec::new(),
        }
    }
}

impl DeviceSearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn add_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn add_sort(
        mut self,
        attribute: impl Into<String>,
        scope: AttributeScope,
        order: super::SortOrder,
    ) -> Self {
        self.sort.push(SearchSort {
            attribute: attribute.into(),
            scope,
            order,
        });
        self
    }
}

// The search endpoint takes one flat list of predicates, all of which must hold.
fn flatten_filters<S>(filters: &[FilterDefinition], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(filters.iter().flat_map(|f| f.predicates.iter()))
}

/// A saved inventory filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryFilter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub terms: Vec<FilterPredicate>,
}

/// Devices matching a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub devices: Vec<Device>,
    /// From `X-Total-Count`.
    pub total_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortOrder;
    use serde_json::json;

    #[test]
    fn test_device_deserialize() {
        let device: Device = serde_json::from_value(json!({
            "id": "device-001",
            "attributes": [
                {"name": "device_type", "value": "raspberrypi4", "scope": "identity"},
                {"name": "artifact_name", "value": "release-1.0", "scope": "inventory"},
                {"name": "env", "value": "prod", "scope": "tags"}
            ],
            "created_ts": "2024-01-15T10:30:00Z",
            "updated_ts": "not a date"
        }))
        .unwrap();

        assert_eq!(device.id, "device-001");
        assert!(device.created_ts.is_some());
        assert!(device.updated_ts.is_none());
        assert_eq!(
            device.attribute_value("device_type", Some(AttributeScope::Identity)),
            Some(&json!("raspberrypi4"))
        );
        assert!(device.attribute("device_type", Some(AttributeScope::Tags)).is_none());
        assert_eq!(device.tags().len(), 1);
    }

    #[test]
    fn test_group_accepts_names_and_objects() {
        let groups: Vec<Group> =
            serde_json::from_value(json!(["prod", {"name": "lab", "device_count": 4}])).unwrap();
        assert_eq!(groups[0].name, "prod");
        assert_eq!(groups[0].device_count, 0);
        assert_eq!(groups[1].device_count, 4);
    }

    #[test]
    fn test_search_filter_serialization() {
        let filter = DeviceSearchFilter::new()
            .page(2, 50)
            .add_filter(
                FilterDefinition::new()
                    .add(FilterPredicate::equals("device_type", "rpi4", AttributeScope::Identity))
                    .add(FilterPredicate::contains("hostname", "edge", AttributeScope::Inventory)),
            )
            .add_sort("name", AttributeScope::Inventory, SortOrder::Desc);

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({
                "page": 2,
                "per_page": 50,
                "filters": [
                    {"attribute": "device_type", "scope": "identity", "type": "$eq", "value": "rpi4"},
                    {"attribute": "hostname", "scope": "inventory", "type": "$regex", "value": ".*edge.*"}
                ],
                "sort": [{"attribute": "name", "scope": "inventory", "order": "desc"}]
            })
        );

        assert_eq!(
            serde_json::to_value(DeviceSearchFilter::new()).unwrap(),
            json!({"page": 1, "per_page": 20})
        );
    }
}

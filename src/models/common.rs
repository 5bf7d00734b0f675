//! Types shared by the inventory and deployments models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats a `sort` query value: `<attribute>:<asc|desc>`.
pub(crate) fn sort_param(attribute: &str, order: SortOrder) -> String {
    format!("{}:{}", attribute, order)
}

/// Deserializes an optional RFC 3339 timestamp, mapping malformed values to `None`.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        DateTime::parse_from_rfc3339(&value)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }))
}

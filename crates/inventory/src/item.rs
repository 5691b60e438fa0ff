use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use stockroom_core::ItemId;

/// Category label used when a record has no (or a blank) category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Inventory record exactly as the remote store reports it.
///
/// Deserialization is lenient: numeric fields accept numbers or numeric
/// strings and fall back to `0`, malformed collections become empty and an
/// unparseable `restockBy` is dropped. Only a missing `name` rejects a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: ItemId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: f64,
    #[serde(
        default,
        deserialize_with = "lenient_category",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    /// Update events; opaque, only the count matters.
    #[serde(default, deserialize_with = "lenient_history")]
    pub history: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub restock_by: Option<DateTime<Utc>>,
}

impl RawItem {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            quantity: 0.0,
            price: 0.0,
            category: None,
            tags: Vec::new(),
            history: Vec::new(),
            restock_by: None,
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into()).filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_history(mut self, history: Vec<Value>) -> Self {
        self.history = history;
        self
    }

    pub fn with_restock_by(mut self, restock_by: DateTime<Utc>) -> Self {
        self.restock_by = Some(restock_by);
        self
    }

    /// Category with the `Uncategorized` default applied.
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::of(&self.name, self.category.as_deref())
    }

    pub fn update_count(&self) -> usize {
        self.history.len()
    }
}

/// Merged view of every record sharing a [`GroupKey`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    /// Id of the first contributing record.
    pub id: ItemId,
    pub name: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub quantity: f64,
    pub price: f64,
    pub restock_by: Option<DateTime<Utc>>,
}

impl CanonicalItem {
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey::of(&self.name, self.category.as_deref())
    }

    /// Inventory value of this line (`quantity * price`).
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }

    /// Re-express as a raw record (history is not carried over).
    pub fn to_raw(&self) -> RawItem {
        RawItem {
            id: self.id.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.price,
            category: self.category.clone(),
            tags: self.tags.clone(),
            history: Vec::new(),
            restock_by: self.restock_by,
        }
    }
}

/// Duplicate-detection key: `normalize(name) | normalize(category)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn of(name: &str, category: Option<&str>) -> Self {
        let category = category
            .map(normalize)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| normalize(UNCATEGORIZED));
        Self(format!("{}|{}", normalize(name), category))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim surrounding whitespace and lowercase.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Fields sent to the store on create/update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub name: String,
    pub quantity: f64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restock_by: Option<DateTime<Utc>>,
}

/// Coerce a JSON value to a finite number; anything malformed becomes `0`.
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

/// Parse an ISO date (`2024-05-01`) or date-time into UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

fn lenient_category<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(values) => values,
        _ => Vec::new(),
    })
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => parse_date(&s),
        _ => None,
    })
}

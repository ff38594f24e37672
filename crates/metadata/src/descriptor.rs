use foundation::ids::EntityKey;
use serde::{Deserialize, Serialize};

/// Descriptive reference data shown in the hover tooltip / pinned panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub key: EntityKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subregion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub currencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_url: Option<String>,
}

impl Descriptor {
    /// A descriptor carrying only identity; every optional field is empty.
    pub fn named(key: impl Into<EntityKey>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            official_name: None,
            capital: None,
            region: None,
            subregion: None,
            population: None,
            area_km2: None,
            languages: Vec::new(),
            currencies: Vec::new(),
            flag_url: None,
        }
    }
}

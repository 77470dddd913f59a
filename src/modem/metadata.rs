//! Module metadata record and the sequential walk that fills it
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::catalog::InfoCode;
use super::driver::ModemDriver;
use super::Result;

pub const TEMPERATURE_FIELD: &str = "moduleTemperature";
pub const VOLTAGES_FIELD: &str = "moduleVoltages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Information(InfoCode),
    Temperature,
    Voltages,
}

impl MetadataField {
    /// Fixed traversal order: information codes, then temperature, then voltages.
    pub fn catalog() -> Vec<MetadataField> {
        InfoCode::ALL
            .iter()
            .copied()
            .map(MetadataField::Information)
            .chain([MetadataField::Temperature, MetadataField::Voltages])
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            MetadataField::Information(code) => code.field_name(),
            MetadataField::Temperature => TEMPERATURE_FIELD,
            MetadataField::Voltages => VOLTAGES_FIELD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    /// The modem answered nothing before the query window closed
    Empty,
    Text(String),
    Lines(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_lines(&self) -> Option<&[String]> {
        match self {
            MetadataValue::Lines(lines) => Some(lines),
            _ => None,
        }
    }
}

impl From<Option<String>> for MetadataValue {
    fn from(value: Option<String>) -> Self {
        value.map(MetadataValue::Text).unwrap_or(MetadataValue::Empty)
    }
}

impl Serialize for MetadataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            MetadataValue::Empty => serializer.serialize_none(),
            MetadataValue::Text(s) => serializer.serialize_str(s),
            MetadataValue::Lines(lines) => lines.serialize(serializer),
        }
    }
}

/// Field name to value, kept in traversal order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMetadata {
    entries: Vec<(&'static str, MetadataValue)>,
}

impl ModuleMetadata {
    pub fn insert(&mut self, field: MetadataField, value: MetadataValue) {
        let name = field.name();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ModuleMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Query every catalog field, one transaction at a time.
///
/// Queries are never overlapped: lines are attributed to whichever query is
/// listening, so each must settle before the next is sent.
pub async fn collect_metadata(driver: &ModemDriver) -> Result<ModuleMetadata> {
    let mut metadata = ModuleMetadata::default();
    for field in MetadataField::catalog() {
        let value: MetadataValue = match field {
            MetadataField::Information(code) => driver.get_module_information(code).await?.into(),
            MetadataField::Temperature => driver.get_module_temperature().await?.into(),
            MetadataField::Voltages => MetadataValue::Lines(driver.get_module_voltages().await?),
        };
        log::debug!("Metadata {} = {:?}", field.name(), value);
        metadata.insert(field, value);
    }
    Ok(metadata)
}

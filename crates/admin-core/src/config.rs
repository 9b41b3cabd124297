//! Config resources: the request-side alteration/lookup spec and the
//! result-side resource and entry records returned by the broker.

use serde::{Deserialize, Serialize};

use crate::error::{AdminError, ErrorCode};

/// Kind of entity a configuration is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// Unknown resource kind.
    Unknown,
    /// Any resource kind (filter use only).
    Any,
    /// A topic.
    Topic,
    /// A consumer group.
    Group,
    /// A broker, named by its integer broker id.
    Broker,
}

impl ResourceType {
    /// Map a wire tag to its variant; tags outside the known range are
    /// rejected so callers can skip resources this client cannot represent.
    pub fn from_tag(tag: i8) -> Option<Self> {
        match tag {
            0 => Some(ResourceType::Unknown),
            1 => Some(ResourceType::Any),
            2 => Some(ResourceType::Topic),
            3 => Some(ResourceType::Group),
            4 => Some(ResourceType::Broker),
            _ => None,
        }
    }

    /// The wire representation of this kind.
    pub fn tag(self) -> i8 {
        match self {
            ResourceType::Unknown => 0,
            ResourceType::Any => 1,
            ResourceType::Topic => 2,
            ResourceType::Group => 3,
            ResourceType::Broker => 4,
        }
    }

    /// Display name, matching the broker's nomenclature.
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Unknown => "UNKNOWN",
            ResourceType::Any => "ANY",
            ResourceType::Topic => "TOPIC",
            ResourceType::Group => "GROUP",
            ResourceType::Broker => "BROKER",
        }
    }
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Source unknown, e.g. in replies from brokers predating the source
    /// field.
    Unknown,
    /// Dynamic topic config specific to this topic.
    DynamicTopic,
    /// Dynamic broker config specific to this broker.
    DynamicBroker,
    /// Dynamic broker config applied to all brokers.
    DynamicDefaultBroker,
    /// Static broker config from the broker's properties file.
    StaticBroker,
    /// Built-in default.
    Default,
}

impl ConfigSource {
    /// Map a wire tag to its variant; unrecognized tags degrade to
    /// [`ConfigSource::Unknown`].
    pub fn from_tag(tag: i8) -> Self {
        match tag {
            1 => ConfigSource::DynamicTopic,
            2 => ConfigSource::DynamicBroker,
            3 => ConfigSource::DynamicDefaultBroker,
            4 => ConfigSource::StaticBroker,
            5 => ConfigSource::Default,
            _ => ConfigSource::Unknown,
        }
    }

    /// The wire representation of this source.
    pub fn tag(self) -> i8 {
        match self {
            ConfigSource::Unknown => 0,
            ConfigSource::DynamicTopic => 1,
            ConfigSource::DynamicBroker => 2,
            ConfigSource::DynamicDefaultBroker => 3,
            ConfigSource::StaticBroker => 4,
            ConfigSource::Default => 5,
        }
    }

    /// Display name, matching the broker's nomenclature.
    pub fn name(self) -> &'static str {
        match self {
            ConfigSource::Unknown => "UNKNOWN_CONFIG",
            ConfigSource::DynamicTopic => "DYNAMIC_TOPIC_CONFIG",
            ConfigSource::DynamicBroker => "DYNAMIC_BROKER_CONFIG",
            ConfigSource::DynamicDefaultBroker => "DYNAMIC_DEFAULT_BROKER_CONFIG",
            ConfigSource::StaticBroker => "STATIC_BROKER_CONFIG",
            ConfigSource::Default => "DEFAULT_CONFIG",
        }
    }
}

/// How a single config property is to be altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterOperation {
    /// Add the property, keeping any other properties on the resource.
    Add,
    /// Set (overwrite) the property.
    Set,
    /// Revert the property to its default.
    Delete,
}

/// One config property inside a [`ConfigResource`] request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterEntry {
    /// Property name.
    pub name: String,
    /// Property value; `None` for deletions.
    pub value: Option<String>,
    /// Requested alteration.
    pub operation: AlterOperation,
}

/// Request-side spec naming a configurable resource, with the properties to
/// alter (AlterConfigs) or the property names to filter on (DescribeConfigs,
/// where an empty list means "all properties").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResource {
    resource_type: ResourceType,
    name: String,
    entries: Vec<AlterEntry>,
}

impl ConfigResource {
    /// New resource spec. Broker resources are named by their integer
    /// broker id.
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Result<Self, AdminError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AdminError::InvalidArg("resource name must not be empty".into()));
        }
        Ok(Self {
            resource_type,
            name,
            entries: Vec::new(),
        })
    }

    fn push_entry(
        &mut self,
        name: impl Into<String>,
        value: Option<String>,
        operation: AlterOperation,
    ) -> Result<&mut Self, AdminError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AdminError::InvalidArg("config name must not be empty".into()));
        }
        self.entries.push(AlterEntry {
            name,
            value,
            operation,
        });
        Ok(self)
    }

    /// Add `name=value`, keeping other properties on the resource.
    pub fn add_config(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, AdminError> {
        self.push_entry(name, Some(value.into()), AlterOperation::Add)
    }

    /// Set `name=value`, overwriting an existing value.
    pub fn set_config(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Self, AdminError> {
        self.push_entry(name, Some(value.into()), AlterOperation::Set)
    }

    /// Revert `name` to its default.
    pub fn delete_config(&mut self, name: impl Into<String>) -> Result<&mut Self, AdminError> {
        self.push_entry(name, None, AlterOperation::Delete)
    }

    /// Resource kind.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties added so far, in insertion order.
    pub fn entries(&self) -> &[AlterEntry] {
        &self.entries
    }
}

/// One config property of a described resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Property name.
    pub name: String,
    /// Property value; `None` when the broker redacts it.
    pub value: Option<String>,
    /// Where the value came from.
    pub source: ConfigSource,
    /// Whether the property is read-only on the broker.
    pub is_read_only: bool,
    /// Whether the value is the built-in default. Always consistent with
    /// `source == ConfigSource::Default`, whichever shape the broker sent.
    pub is_default: bool,
    /// Whether the value is sensitive and redacted.
    pub is_sensitive: bool,
    /// Whether this entry is a synonym of another entry.
    pub is_synonym: bool,
    /// Synonym entries in order of precedence, most relevant first.
    pub synonyms: Vec<ConfigEntry>,
}

/// Per-resource outcome of an AlterConfigs or DescribeConfigs request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResourceResult {
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Resource name.
    pub name: String,
    /// Broker-reported outcome, [`ErrorCode::None`] on success.
    pub error: ErrorCode,
    /// Error description when `error` is set.
    pub error_message: Option<String>,
    /// Described properties; empty for AlterConfigs results.
    pub entries: Vec<ConfigEntry>,
}

impl ConfigResourceResult {
    /// Whether this resource failed.
    pub fn is_err(&self) -> bool {
        self.error.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_tags() {
        assert_eq!(ResourceType::from_tag(4), Some(ResourceType::Broker));
        assert_eq!(ResourceType::from_tag(5), None);
        assert_eq!(ResourceType::from_tag(-1), None);
        assert_eq!(ResourceType::Broker.tag(), 4);
        assert_eq!(ResourceType::Broker.name(), "BROKER");
    }

    #[test]
    fn config_source_tags_degrade_to_unknown() {
        assert_eq!(ConfigSource::from_tag(5), ConfigSource::Default);
        assert_eq!(ConfigSource::from_tag(99), ConfigSource::Unknown);
    }

    #[test]
    fn resource_collects_alterations_in_order() {
        let mut r = ConfigResource::new(ResourceType::Topic, "t").unwrap();
        r.set_config("retention.ms", "100").unwrap();
        r.delete_config("cleanup.policy").unwrap();
        assert_eq!(r.entries().len(), 2);
        assert_eq!(r.entries()[0].operation, AlterOperation::Set);
        assert_eq!(r.entries()[1].value, None);

        assert!(ConfigResource::new(ResourceType::Topic, "").is_err());
        assert!(r.set_config("", "x").is_err());
    }
}

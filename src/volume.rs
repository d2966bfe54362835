//! Volumes selected for rotation and the discovery seam that finds them.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderFuture;
use crate::tag::TagFilter;

/// Block storage volume attached to a tagged instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Volume {
    /// Provider-specific volume identifier.
    pub id: String,
    /// Identifier of the instance the volume is attached to.
    pub instance_id: String,
    /// Human-friendly instance name, when the provider reports one.
    pub instance_name: Option<String>,
    /// Attachment slot or device label on the instance.
    pub device: String,
    /// Tags of the owning instance. Only discovery looks at them.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Volume {
    /// Creates a volume description, trimming string fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        instance_id: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into().trim().to_owned(),
            instance_id: instance_id.into().trim().to_owned(),
            instance_name: None,
            device: device.into().trim().to_owned(),
            tags: Vec::new(),
        }
    }

    /// Sets the optional instance name, dropping blank values.
    #[must_use]
    pub fn instance_name(mut self, value: Option<String>) -> Self {
        self.instance_name = value
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());
        self
    }

    /// Sets the instance tags.
    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Label used in snapshot names: the instance name when known, otherwise
    /// the instance identifier.
    #[must_use]
    pub fn owner_label(&self) -> &str {
        self.instance_name.as_deref().unwrap_or(&self.instance_id)
    }
}

/// Finds the volumes whose owning instance carries a tag.
pub trait VolumeDiscovery {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every volume attached to an instance tagged with `filter`.
    fn discover<'a>(
        &'a self,
        filter: &'a TagFilter,
    ) -> ProviderFuture<'a, Vec<Volume>, Self::Error>;
}

use serde::{Deserialize, Serialize};

pub const CREATED_BY_KEY: &str = "created-by";

/// Subset of `gcloud compute instances describe --format json`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDto {
    pub name: String,
    #[serde(default)]
    pub metadata: MetadataDto,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MetadataDto {
    #[serde(default)]
    pub items: Vec<MetadataItemDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MetadataItemDto {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl InstanceDto {
    pub fn created_by(&self) -> Option<&str> {
        self.metadata.items.iter().find(|item| item.key == CREATED_BY_KEY).map(|item| item.value.as_str())
    }
}

/// Subset of `gcloud compute instance-groups managed describe --format json`.
///
/// `targetSize` is kept as raw JSON so a non-numeric value can be reported
/// instead of failing deserialization.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedGroupDto {
    pub name: String,
    #[serde(default)]
    pub target_size: serde_json::Value,
    #[serde(default)]
    pub status: Option<ManagedGroupStatusDto>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedGroupStatusDto {
    #[serde(default)]
    pub is_stable: bool,
}

use serde::{Deserialize, Serialize};

/// Optional JSON configuration file. Every field falls back to the built-in default.
#[derive(Debug, Default, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CyclerConfigDto {
    pub context: Option<String>,
    pub project: Option<String>,
    pub drain_timeout_secs: Option<u64>,
    pub retry: Option<RetryDto>,
    pub poll: Option<PollDto>,
    pub labels: Option<LabelsDto>,
}

#[derive(Debug, Default, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryDto {
    pub max_attempts: Option<u32>,
    pub delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PollDto {
    pub interval_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LabelsDto {
    pub role: Option<String>,
    pub retiring: Option<String>,
    pub zone: Option<String>,
    pub region: Option<String>,
}

pub mod config_dto;
pub mod gcloud_dto;
pub mod kubectl_dto;

pub mod cluster;
pub mod fleet;
pub mod gcloud;
pub mod kubectl;
pub mod runner;
pub mod simulated;

pub mod clock;
pub mod id;
pub mod instance_group;
pub mod node;
pub mod retirement_batch;
pub mod zone_distribution;

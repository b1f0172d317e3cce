// Domain layer: job/filing models and the agent port. No HTTP or process code here.

pub mod model;
pub mod ports;

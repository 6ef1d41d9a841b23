// Domain layer: core models and ports (interfaces). No storage or transport concerns here.

pub mod model;
pub mod ports;

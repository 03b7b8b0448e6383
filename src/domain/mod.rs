// Domain layer: records, pagination and the ports (traits) the core depends on.

pub mod model;
pub mod ports;

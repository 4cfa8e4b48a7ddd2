// Domain layer: backend data shapes, status mapping and ports (interfaces).

pub mod model;
pub mod ports;
pub mod status;

pub mod clock;
pub mod config;
pub mod drift;
pub mod errors;
pub mod logger;
pub mod pipeline;
pub mod replay;
pub mod risk;
pub mod router;

pub mod buffers;
pub mod config;
pub mod conflicts;
pub mod habit;
pub mod logs;
pub mod plan;
pub mod revenue;
pub mod rpc;
pub mod slots;

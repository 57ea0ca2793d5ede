pub mod packer;
pub mod render;
pub mod scenario;
pub mod types;

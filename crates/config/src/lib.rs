// Configuration loading

pub mod ai;
pub mod settings;

pub mod controller;

pub use controller::{Courier, find_config_file};

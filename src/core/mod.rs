pub mod expected_value;
pub mod filter_config;
pub mod gauntlet;
pub mod sessions;

pub mod config;
pub mod core;
pub mod models;
pub mod pipeline;
#[cfg(test)]
pub mod test_helpers;
pub mod trading;

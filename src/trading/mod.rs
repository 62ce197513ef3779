pub mod pattern_store;

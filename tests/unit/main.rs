#[path = "../common/mod.rs"]
mod common;

mod cache_test;
mod provider_test;

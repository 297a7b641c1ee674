pub mod agent;
pub mod core;
pub mod handlers;
pub mod models;
pub mod retention;
pub mod stores;

#[cfg(test)]
pub(crate) mod test_support;

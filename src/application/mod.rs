pub mod bootstrap;
pub mod commands;
pub mod content_policy;
pub mod navigation;
pub mod resource_cache;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub mod config;
pub mod engine;
pub mod error;
pub mod pick;
pub mod reconcile;
pub mod schedule;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub mod batch;
pub mod candidates;
pub mod eligibility;
pub mod engine;
pub mod fairness;
pub mod notifier;
pub mod pipeline;
pub mod schema_probe;
pub mod store;
pub mod tracer;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

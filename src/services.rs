pub mod search;
pub mod snapshots;
pub mod task_cache;
pub mod tracking;

#[cfg(test)]
pub mod fake;

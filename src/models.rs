pub mod action;
pub mod create;
pub mod snapshot;
pub mod task;

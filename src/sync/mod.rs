//! Remote/local state reconciliation

pub mod reconciler;

pub use reconciler::{Directive, Reconciler, Reconciliation};

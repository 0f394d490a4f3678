pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;

use crate::error::Result;
use metrics::{counter, histogram};
use std::time::Instant;

/// Records latency for a store operation and counts its failures by kind.
pub(crate) fn observe<T>(op: &'static str, started: Instant, result: &Result<T>) {
    histogram!("delivery_order_op_seconds", "op" => op).record(started.elapsed().as_secs_f64());
    if let Err(e) = result {
        counter!("delivery_order_op_failures_total", "op" => op, "kind" => e.kind()).increment(1);
    }
}

pub mod basic;
pub mod managed;

pub use basic::{BasicHeap, HeapConfig};
pub use managed::{ManagedHeapError, ManagedObjectHeap};

pub mod bench;

pub use bench::{TestBench, ORDERS_CSV, PEOPLE_CSV};

//! Scanner module - ARP sweeping and latency probing

mod arp;
mod latency;

pub use arp::arp_sweep;
pub use latency::measure_latency;

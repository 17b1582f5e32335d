//! Network module - interface detection, subnet resolution, DNS and vendor lookups

mod dns;
mod interface;
mod subnet;
mod vendor;

pub use dns::{resolve_hostname, reverse_lookup};
pub use interface::find_interface_for_ip;
pub use subnet::{is_special_address, resolve_local_subnet, sweep_targets, LocalNet};
pub use vendor::{lookup_vendor, vendor_client};

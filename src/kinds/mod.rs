//! Built-in resource kinds.

mod acls;
mod l3_interfaces;
mod vlans;

pub use acls::Acls;
pub use l3_interfaces::L3Interfaces;
pub use vlans::Vlans;

//! Everything that talks to the network: collector delivery and the
//! reachability probe.

pub mod delivery;
pub mod http;
pub mod probe;

pub use delivery::{deliver_within, DeliveryClient, DeliveryError};
pub use http::HttpDeliveryClient;
pub use probe::{AlwaysAvailable, AvailabilityProbe, HttpProbe, ReachabilityTracker, DEFAULT_PROBE_URL};

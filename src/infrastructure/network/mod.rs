pub mod reachability_probe;

pub use reachability_probe::ReachabilityProbe;

pub mod manager;
pub mod scheduler;

pub use manager::DiscoveryManager;
pub use scheduler::DiscoveryScheduler;

pub mod battery;
pub mod chargers;
pub mod clock;
pub mod dispatch;
pub mod draws;
pub mod ecs;
pub mod error;
pub mod locks;
pub mod network;
pub mod records;
pub mod records_export;
pub mod runner;
pub mod scenario;
pub mod systems;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

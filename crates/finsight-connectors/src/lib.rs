pub mod mock_warehouse;
pub mod scripted_generator;

pub use mock_warehouse::MockWarehouse;
pub use scripted_generator::ScriptedGenerator;

pub mod app;
pub mod authz;
pub mod context;
pub mod db;
pub mod directory;
pub mod errors;
pub mod events;
pub mod models;
pub mod routes;
pub mod token;
pub mod utils;

// Re-export commonly used items for tests
pub use app::create_app;

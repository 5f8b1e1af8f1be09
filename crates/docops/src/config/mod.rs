pub mod loader;
pub mod schema;

pub use loader::{
    load_operations, load_operations_from_str, load_settings, load_settings_from_str,
    parse_operations,
};
pub use schema::Settings;

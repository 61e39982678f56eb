pub mod errors;
pub mod key_state;
pub mod models;
pub mod settings;

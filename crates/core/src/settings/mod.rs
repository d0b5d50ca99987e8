pub mod domain;
pub mod infrastructure;
pub mod settings_state;

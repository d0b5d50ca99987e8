pub mod domain;
pub mod infrastructure;
pub mod source_face_registry;

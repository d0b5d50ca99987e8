pub mod annotation;
pub mod compositor;
pub mod face_selection;
pub mod face_swapper;
pub mod pixel_region;

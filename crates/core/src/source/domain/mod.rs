pub mod image_decoder;
pub mod source_face;

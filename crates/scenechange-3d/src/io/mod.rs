/// Annotation file reader module.
pub mod annotation;

pub mod clock;
pub mod mime;

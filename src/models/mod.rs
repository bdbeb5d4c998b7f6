pub mod loaders;
pub mod question;
pub mod registry;

pub use loaders::{load_image_manifest, parse_image_manifest};
pub use question::{ImageRecord, Question, QuestionState};
pub use registry::QuestionRegistry;

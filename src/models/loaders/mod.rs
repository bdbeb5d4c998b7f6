pub mod toml_loader;

pub use toml_loader::{load_image_manifest, parse_image_manifest};

//! Asset import

mod model_loader;

pub use model_loader::{load_obj_file, load_obj_source, ModelLoadError, SubMesh};

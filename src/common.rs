
mod bbox;
mod detection;
mod model_preset;

pub use bbox::*;
pub use detection::*;
pub use model_preset::*;

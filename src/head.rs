
mod assembly;
mod postprocess;

pub use assembly::*;
pub use postprocess::*;

// Data models (structs)
pub mod job;
pub mod model_info;
pub mod sales;
pub mod settings;

pub use job::*;
pub use model_info::*;
pub use sales::*;
pub use settings::*;

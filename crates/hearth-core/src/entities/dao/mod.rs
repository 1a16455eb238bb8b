pub mod model;
pub mod model_config;

pub use model::{
    display_name_for, normalize_model_name, ModelPatch, ModelRecord, ModelStatus, NewModel,
};
pub use model_config::{ModelConfigPatch, ModelConfigRecord};

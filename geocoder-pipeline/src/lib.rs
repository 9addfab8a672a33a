//! The seven-stage `Query` normalization pipeline, composed by an external
//! driver over the `Stage` trait from `geocoder_core`.

pub mod driver;
pub mod stage;

pub use driver::Pipeline;
pub use stage::{
    CityRecoveryStage, CityStage, IngestStage, MachiazaStage, ParcelStage, PatchStage,
    PrefectureStage,
};

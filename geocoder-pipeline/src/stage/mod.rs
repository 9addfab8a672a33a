pub mod city;
pub mod city_recovery;
pub mod ingest;
pub mod machiaza;
pub mod parcel;
pub mod patches;
pub mod prefecture;

pub use city::CityStage;
pub use city_recovery::CityRecoveryStage;
pub use ingest::IngestStage;
pub use machiaza::MachiazaStage;
pub use parcel::ParcelStage;
pub use patches::PatchStage;
pub use prefecture::PrefectureStage;

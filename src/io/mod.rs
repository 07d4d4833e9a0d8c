//! Persistence: binary artifact envelopes, CSV vectors and sidecar files

pub mod artifact;
pub mod sidecar;
pub mod tabular;

pub use artifact::{
    read_artifact, write_artifact, write_atomic, ArtifactKind, Publication, FORMAT_VERSION, MAGIC,
};
pub use sidecar::{
    count_sidecar_path, read_count, read_record, record_path, stage_count, stage_record,
    write_count, write_record,
};
pub use tabular::{read_result_csv, read_weights_csv, stage_result_csv, write_result_csv};

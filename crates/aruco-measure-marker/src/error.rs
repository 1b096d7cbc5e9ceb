/// Errors returned when building a marker detector.
#[derive(thiserror::Error, Debug)]
pub enum MarkerDetectError {
    #[error("unknown marker dictionary {0}")]
    UnknownDictionary(String),
    #[error("dictionary {name} uses {bits} bits per marker (at most 64 supported)")]
    UnsupportedDictionary { name: String, bits: usize },
}

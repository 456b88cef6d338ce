//! Error taxonomy for the asset pipeline and the render backend.
//!
//! Decode and import failures are recoverable: the stage logs them and shows
//! the placeholder primitive instead. Backend errors surface from a draw and
//! are handled by the host shell (usually by reconfiguring the surface).

use thiserror::Error;

/// The encoded payload of an asset could not be turned into bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload has no ',' separating the MIME header from the body")]
    MissingSeparator,
    #[error("payload header `{0}` is not base64 tagged")]
    NotBase64Tagged(String),
    #[error("payload body is empty")]
    Empty,
    #[error("payload body is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

/// The decoded bytes are not a usable binary mesh bundle.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed mesh bundle: {0}")]
    Malformed(#[from] gltf::Error),
    #[error("mesh bundle contains no scene")]
    NoScene,
    #[error("mesh bundle contains no triangle meshes")]
    NoMeshes,
    #[error("mesh bundle references external buffer `{0}`")]
    ExternalBuffer(String),
    #[error("mesh bundle references buffer {0} which has no data")]
    MissingBuffer(usize),
    #[error("embedded buffer could not be decoded: {0}")]
    EmbeddedBuffer(#[source] DecodeError),
    #[error("node hierarchy is deeper than {0} levels")]
    TooDeep(usize),
}

/// Any failure along decode -> import.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// A draw could not be issued.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("output surface was lost or is outdated")]
    SurfaceLost,
    #[error("output surface error: {0}")]
    Surface(String),
}

use oci_spec::OciSpecError;
use std::path::PathBuf;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Invalid user input
    //
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
    #[error("Invalid name for repository: {0}")]
    InvalidName(String),
    #[error("Invalid reference to image: {0}")]
    InvalidReference(String),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    //
    // Invalid inventory table
    //
    #[error("Missing column '{column}' in table header of {path}")]
    InvalidTableHeader { column: &'static str, path: PathBuf },
    #[error("Too few fields in table row: {0}")]
    InvalidRow(String),
    #[error("No unambiguous base version for {name}: found {versions:?}")]
    AmbiguousBaseVersion { name: String, versions: Vec<String> },

    //
    // Malformed upstream data
    //
    #[error(transparent)]
    InvalidJson(#[from] serde_json::error::Error),

    //
    // Error from OCI registry
    //
    #[error("Authorization failed against {0}")]
    AuthorizationFailed(Url),
    #[error("Unsupported WWW-Authenticate header: {0}")]
    UnSupportedAuthHeader(String),
    #[error(transparent)]
    NetworkError(#[from] ureq::Transport),
    #[error(transparent)]
    RegistryError(#[from] oci_spec::distribution::ErrorResponse),

    //
    // System error
    //
    #[error(transparent)]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    UnknownIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<OciSpecError> for Error {
    fn from(e: OciSpecError) -> Self {
        match e {
            OciSpecError::SerDe(e) => Error::InvalidJson(e),
            OciSpecError::Io(e) => Error::UnknownIo(e),
            OciSpecError::Builder(_) => unreachable!(),
            OciSpecError::Other(e) => panic!("Unknown error within oci_spec: {}", e),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(_, res) => match res.into_json::<oci_spec::distribution::ErrorResponse>() {
                Ok(err) => Error::RegistryError(err),
                Err(e) => Error::UnknownIo(e),
            },
            ureq::Error::Transport(e) => Error::NetworkError(e),
        }
    }
}

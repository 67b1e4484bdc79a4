use thiserror::Error;
use yoto_api::DeviceId;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] yoto_dispatch::DispatchError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] yoto_catalog::CatalogError),

    #[error("Transport error: {0}")]
    Transport(#[from] yoto_stream::TransportError),

    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Coordinator has been shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, SdkError>;

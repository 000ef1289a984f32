pub mod config;
pub mod error;
pub mod imaging;
pub mod invoke;
pub mod routes;
pub mod server;
pub mod session;
pub mod stream;
pub mod telemetry;
pub mod upload;

pub use error::{ClientError, InferenceError, ServiceError, StartupError};
pub use invoke::Cancellation;
pub use session::{Device, ModelSession, TensorModel};
pub use stream::ResponseStream;

//! Domain model (message, envelope, caller info, ids, failures).

pub mod caller;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod info;
pub mod message;

pub use caller::CallerInfo;
pub use envelope::Envelope;
pub use errors::{DispatchFailure, HandlerError};
pub use ids::{EmissionId, ObserverId, SubscriptionId};
pub use info::{InfoBody, InfoLevel};
pub use message::{DynMessage, Message, MessageType, Phase, RequireListener};

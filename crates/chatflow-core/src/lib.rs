pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod mapping;
pub mod request;
pub mod response;
pub mod types;
pub mod update;

pub use error::{ErrorPhase, FlowError, Result};
pub use handler::{ActiveScenario, EventOutcome, ExceptionHandler, UpdateHandler};
pub use mapping::RequestMapping;
pub use request::{Accessor, CapturedError, UpdateRequest};
pub use response::{CustomResponse, OutboundMessage, Response, ResponseSink};
pub use types::{MessageType, RequestId, RequestType};
pub use update::{Update, UpdateKind};

//! Core request plumbing shared by the session store, the token negotiator
//! and the data endpoints.

pub mod executor;
pub mod reqwest_transport;
pub mod retry;
pub mod transport;
pub mod types;

pub use executor::RequestExecutor;
pub use reqwest_transport::ReqwestTransport;
pub use retry::{
    AttemptFailure, Exhaustion, FailureClass, RetryPolicy, RetryState, Step, classify,
    classify_status, classify_transport,
};
pub use transport::{TransportError, TrendsTransport};
pub use types::{Expect, RequestSpec, TransportRequest, TransportResponse};

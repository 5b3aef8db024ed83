use async_trait::async_trait;

use crate::error::ReconcileError;

pub mod http;
pub mod types;

pub use types::{ApiMethod, ApiRequest, ApiResponse, Collection, Page, ResourceId};

/// Transport seam between the reconciliation pipeline and the remote controller.
///
/// Implementations return `Ok` for every response the controller produced, whatever
/// its status; `Err` is reserved for failures to obtain a response at all.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ReconcileError>;
}

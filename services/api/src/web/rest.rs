//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification covering the
//! operator-facing REST surface.

use crate::web::clients::Pagination;
use crate::web::dashboard::StatsResponse;
use crate::web::messages::{SendErrorBody, SendMessageRequest};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::clients::list_clients,
        crate::web::messages::send_message,
        crate::web::dashboard::stats,
    ),
    components(
        schemas(Pagination, SendMessageRequest, SendErrorBody, StatsResponse)
    ),
    tags(
        (name = "WhatsApp Messaging API", description = "Operator endpoints for the WhatsApp customer messaging backend.")
    )
)]
pub struct ApiDoc;

//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//! - **[`extract`]**: The validating JSON body extractor
//!
//! # API Structure
//!
//! - **Authentication** (`/auth/*`): Login, registration, token refresh, password reset. Public.
//! - **Self** (`/user/*`): The caller's own account. Any role.
//! - **Administration** (`/admin/*`): Provisioning and status changes within the caller's
//!   hierarchy. ADMIN and MASTER.
//! - **Master** (`/master/*`): Irreversible operations. MASTER only.
//! - **Public** (`/public/*`): Health check and the OpenAPI page at `/public/docs`.

pub mod extract;
pub mod handlers;
pub mod models;

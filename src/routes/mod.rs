/// Router Module Index
///
/// Organizes the application's routing into security-segregated modules:
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of the admin-only endpoints.

/// Routes accessible to all clients (reads, update, delete; only the
/// creation and upload paths are gated).
pub mod public;

/// Routes restricted to authenticated users with the 'ADMIN' role:
/// character creation and artwork upload.
pub mod admin;

// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth). The router in lib.rs decides
// which tier a route belongs to; handlers never check tokens themselves.
pub mod protected; // Tier 2: JWT authentication required
pub mod public; // Tier 1: No authentication required

use uuid::Uuid;

/// Path ids that are not UUIDs cannot name any record.
pub(crate) fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

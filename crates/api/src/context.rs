use tradeflow_core::OrganizationId;

/// Organization context for a request.
///
/// Resolved from the external organization key; must be present for all
/// ledger routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrganizationContext {
    organization_id: OrganizationId,
}

impl OrganizationContext {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self { organization_id }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

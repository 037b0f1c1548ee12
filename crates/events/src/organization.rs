use tradeflow_core::OrganizationId;

use crate::EventEnvelope;

/// Messages that belong to exactly one organization.
///
/// Workers pinned to an organization use this to drop foreign messages.
pub trait OrganizationScoped {
    fn organization_id(&self) -> OrganizationId;
}

impl<E> OrganizationScoped for EventEnvelope<E> {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id()
    }
}

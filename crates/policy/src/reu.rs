/// Exposure multiplier: how much surface area the sensitive content reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureKind {
    TextOnly,
    Attachment,
    /// Attachment whose extracted text exceeded the bulk-text threshold.
    Bulk,
    /// The request never reached upstream (blocked) — exposure is nominal.
    Blocked,
}

impl ExposureKind {
    fn multiplier(self) -> f64 {
        match self {
            ExposureKind::TextOnly => 2.0,
            ExposureKind::Attachment => 5.0,
            ExposureKind::Bulk => 10.0,
            ExposureKind::Blocked => 1.0,
        }
    }
}

/// Destination multiplier: how much the proxy trusts where the content is
/// headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationTier {
    EnterpriseApproved,
    BusinessSaas,
    PublicAi,
    Unknown,
    Banned,
}

impl DestinationTier {
    fn multiplier(self) -> f64 {
        match self {
            DestinationTier::EnterpriseApproved => 0.5,
            DestinationTier::BusinessSaas => 1.0,
            DestinationTier::PublicAi => 2.0,
            DestinationTier::Unknown => 3.0,
            DestinationTier::Banned => 5.0,
        }
    }
}

/// `REU = sensitivity_points × EM × DM`.
pub fn compute_reu(sensitivity_points: u8, exposure: ExposureKind, destination: DestinationTier) -> f64 {
    sensitivity_points as f64 * exposure.multiplier() * destination.multiplier()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reu_combines_both_multipliers() {
        let reu = compute_reu(50, ExposureKind::Attachment, DestinationTier::Unknown);
        assert_eq!(reu, 50.0 * 5.0 * 3.0);
    }

    #[test]
    fn blocked_exposure_has_nominal_multiplier() {
        let reu = compute_reu(90, ExposureKind::Blocked, DestinationTier::Banned);
        assert_eq!(reu, 90.0 * 1.0 * 5.0);
    }
}

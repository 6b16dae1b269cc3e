#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a script license over its purchase lifecycle.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in
/// SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Created at purchase time; waiting for payment confirmation.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Payment confirmed; grants full-script downloads until expiry.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    /// Payment failed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
    /// Marked expired by bookkeeping. Downloads also stop as soon as
    /// `expires_at` elapses, whether or not this value has been written yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "expired"))]
    Expired,
}

impl LicenseStatus {
    /// Returns true if this status (alone) authorizes full-script downloads.
    /// Expiry is checked separately against `expires_at`.
    pub fn authorizes_download(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// All possible status values.
    pub const ALL: &'static [LicenseStatus] =
        &[Self::Pending, Self::Active, Self::Failed, Self::Expired];

    /// Returns the string representation (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown license status: {other}")),
        }
    }
}

/// Status of a perusal request.
///
/// There is deliberately no `expired` value: expiry is computed by comparing
/// `expires_at` to the current time at check time, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum PerusalRequestStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Requests are auto-approved on creation in current behavior.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "approved"))]
    Approved,
}

impl PerusalRequestStatus {
    /// All possible status values.
    pub const ALL: &'static [PerusalRequestStatus] = &[Self::Pending, Self::Approved];

    /// Returns the string representation (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

impl fmt::Display for PerusalRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerusalRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            other => Err(format!("unknown perusal request status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_status_round_trips_through_strings() {
        for status in LicenseStatus::ALL {
            let parsed: LicenseStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
    }

    #[test]
    fn license_status_serde_uses_lowercase() {
        let json = serde_json::to_string(&LicenseStatus::Active).unwrap();
        assert_eq!(json, "\"active\"");
        let parsed: LicenseStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(parsed, LicenseStatus::Expired);
    }

    #[test]
    fn only_active_authorizes_download() {
        for status in LicenseStatus::ALL {
            assert_eq!(
                status.authorizes_download(),
                *status == LicenseStatus::Active
            );
        }
    }

    #[test]
    fn perusal_status_round_trips_through_strings() {
        for status in PerusalRequestStatus::ALL {
            let parsed: PerusalRequestStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, *status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("cancelled".parse::<LicenseStatus>().is_err());
        assert!("expired".parse::<PerusalRequestStatus>().is_err());
    }
}

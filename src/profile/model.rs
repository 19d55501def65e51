//! Career profile data model.
//!
//! Every field is optional: the profile is filled in incrementally over an
//! onboarding conversation. Tier 1 fields come from the user, Tier 2 from
//! company enrichment, and the calibration signals from the agent's own
//! assessment.

use serde::{Deserialize, Serialize};

/// Deserializers for headcount fields: non-negative whole numbers, which
/// JSON writers may still send as `5.0`.
pub(crate) mod whole_number {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    fn convert<T: TryFrom<u64>, E: Error>(n: &Number) -> Result<T, E> {
        let value = match (n.as_u64(), n.as_f64()) {
            (Some(v), _) => v,
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => f as u64,
            _ => return Err(E::custom(format!("expected a non-negative whole number, got {n}"))),
        };
        T::try_from(value).map_err(|_| E::custom(format!("{n} is out of range")))
    }

    pub fn required<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        convert(&Number::deserialize(deserializer)?)
    }

    pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        Option::<Number>::deserialize(deserializer)?
            .map(|n| convert(&n))
            .transpose()
    }
}

/// Headcount bucket of the user's employer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanySize {
    #[serde(rename = "STARTUP_1_10")]
    Startup1To10,
    #[serde(rename = "STARTUP_11_50")]
    Startup11To50,
    #[serde(rename = "SMALL_51_200")]
    Small51To200,
    #[serde(rename = "MEDIUM_201_1000")]
    Medium201To1000,
    #[serde(rename = "LARGE_1001_5000")]
    Large1001To5000,
    #[serde(rename = "ENTERPRISE_5001_PLUS")]
    Enterprise5001Plus,
}

impl CompanySize {
    pub const ALL: [&'static str; 6] = [
        "STARTUP_1_10",
        "STARTUP_11_50",
        "SMALL_51_200",
        "MEDIUM_201_1000",
        "LARGE_1001_5000",
        "ENTERPRISE_5001_PLUS",
    ];

    /// Bucket for an exact headcount.
    pub fn from_employee_count(count: u64) -> Self {
        match count {
            0..=10 => Self::Startup1To10,
            11..=50 => Self::Startup11To50,
            51..=200 => Self::Small51To200,
            201..=1000 => Self::Medium201To1000,
            1001..=5000 => Self::Large1001To5000,
            _ => Self::Enterprise5001Plus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareerTrack {
    Ic,
    Manager,
    StaffPlusIc,
    TechLead,
    Executive,
}

impl CareerTrack {
    pub const ALL: [&'static str; 5] = ["IC", "MANAGER", "STAFF_PLUS_IC", "TECH_LEAD", "EXECUTIVE"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Industry {
    TechConsumer,
    TechEnterprise,
    Fintech,
    HealthcareTech,
    Ecommerce,
    #[serde(rename = "CRYPTO_WEB3")]
    CryptoWeb3,
    Gaming,
    Infrastructure,
    #[serde(rename = "AI_ML")]
    AiMl,
    Consulting,
    NonTech,
}

impl Industry {
    pub const ALL: [&'static str; 11] = [
        "TECH_CONSUMER",
        "TECH_ENTERPRISE",
        "FINTECH",
        "HEALTHCARE_TECH",
        "ECOMMERCE",
        "CRYPTO_WEB3",
        "GAMING",
        "INFRASTRUCTURE",
        "AI_ML",
        "CONSULTING",
        "NON_TECH",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    UsBayArea,
    UsOther,
    Europe,
    AsiaPacific,
    LatinAmerica,
    RemoteGlobal,
}

impl Region {
    pub const ALL: [&'static str; 6] = [
        "US_BAY_AREA",
        "US_OTHER",
        "EUROPE",
        "ASIA_PACIFIC",
        "LATIN_AMERICA",
        "REMOTE_GLOBAL",
    ];
}

/// A user's career profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    // Tier 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<CompanySize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_track: Option<CareerTrack>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub immediate_team_size: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub cross_functional_teams: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub direct_reports: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,

    // Tier 2
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    pub company_employee_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_funding_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_known_leveling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_reported_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_tech_stack: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<String>,

    // Calibration signals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_consistency: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_alignment_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_confidence: Option<f64>,
}

macro_rules! merge_fields {
    ($target:expr, $partial:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $partial.$field {
                $target.$field = Some(value);
            }
        )+
    };
}

impl Profile {
    /// Overlay every field set in `partial`; unset fields keep their value.
    pub fn merge(&mut self, partial: Profile) {
        merge_fields!(
            self,
            partial,
            role,
            years_experience,
            company_name,
            company_size,
            career_track,
            immediate_team_size,
            cross_functional_teams,
            direct_reports,
            industry,
            region,
            company_employee_count,
            company_funding_stage,
            company_known_leveling,
            self_reported_level,
            primary_tech_stack,
            enriched_at,
            scope_confidence,
            track_consistency,
            industry_alignment_score,
            anomaly_flags,
            enrichment_confidence,
        );
    }

    pub fn is_empty(&self) -> bool {
        self == &Profile::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enum_wire_names() {
        assert_eq!(
            serde_json::to_value(CompanySize::Enterprise5001Plus).unwrap(),
            "ENTERPRISE_5001_PLUS"
        );
        assert_eq!(serde_json::to_value(CareerTrack::StaffPlusIc).unwrap(), "STAFF_PLUS_IC");
        assert_eq!(serde_json::to_value(Industry::CryptoWeb3).unwrap(), "CRYPTO_WEB3");
        assert_eq!(serde_json::to_value(Industry::AiMl).unwrap(), "AI_ML");
        assert_eq!(serde_json::to_value(Region::UsBayArea).unwrap(), "US_BAY_AREA");
        for name in Industry::ALL {
            let parsed: Industry = serde_json::from_value(json!(name)).unwrap();
            assert_eq!(serde_json::to_value(parsed).unwrap(), name);
        }
    }

    #[test]
    fn merge_is_per_field_last_write_wins() {
        let mut profile: Profile = serde_json::from_value(json!({
            "role": "Engineer",
            "companyName": "Acme",
            "yearsExperience": 4
        }))
        .unwrap();
        let partial: Profile = serde_json::from_value(json!({
            "role": "Senior Engineer",
            "region": "EUROPE"
        }))
        .unwrap();

        profile.merge(partial);

        assert_eq!(profile.role.as_deref(), Some("Senior Engineer"));
        assert_eq!(profile.company_name.as_deref(), Some("Acme"));
        assert_eq!(profile.years_experience, Some(4.0));
        assert_eq!(profile.region, Some(Region::Europe));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Profile, _> = serde_json::from_value(json!({"favoriteColor": "teal"}));
        assert!(result.is_err());
    }

    #[test]
    fn headcounts_accept_integral_floats_only() {
        let profile: Profile = serde_json::from_value(json!({
            "immediateTeamSize": 5.0,
            "companyEmployeeCount": 125
        }))
        .unwrap();
        assert_eq!(profile.immediate_team_size, Some(5));
        assert_eq!(profile.company_employee_count, Some(125));

        for bad in [json!(-1), json!(2.5), json!(-3.0), json!(5_000_000_000u64)] {
            let result: Result<Profile, _> =
                serde_json::from_value(json!({ "directReports": bad.clone() }));
            assert!(result.is_err(), "{bad} should be rejected");
        }
        let cleared: Profile = serde_json::from_value(json!({ "directReports": null })).unwrap();
        assert_eq!(cleared.direct_reports, None);
    }

    #[test]
    fn headcount_buckets() {
        assert_eq!(CompanySize::from_employee_count(125), CompanySize::Small51To200);
        assert_eq!(CompanySize::from_employee_count(150_000), CompanySize::Enterprise5001Plus);
    }
}

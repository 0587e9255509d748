//! Typed business configuration

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ride::VehicleClass;

/// Pricing for one vehicle class
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FareRule {
    pub vehicle_class: VehicleClass,
    pub base_fare: Decimal,
    pub per_km: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FeatureToggles {
    pub chat_enabled: bool,
    pub tips_enabled: bool,
    pub auto_offline_on_stale_location: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            chat_enabled: true,
            tips_enabled: true,
            auto_offline_on_stale_location: true,
        }
    }
}

/// Business parameters admins edit at runtime
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    pub fares: Vec<FareRule>,
    /// Platform cut of a completed ride's fare, in `[0, 1)`
    pub commission_rate: Decimal,
    pub toggles: FeatureToggles,
}

impl Default for AppSettings {
    fn default() -> Self {
        let rule = |vehicle_class, base_fare, per_km| FareRule {
            vehicle_class,
            base_fare,
            per_km,
        };
        Self {
            fares: vec![
                rule(VehicleClass::Bike, dec!(30), dec!(8)),
                rule(VehicleClass::Auto, dec!(45), dec!(12)),
                rule(VehicleClass::Mini, dec!(80), dec!(14)),
                rule(VehicleClass::Sedan, dec!(110), dec!(17)),
                rule(VehicleClass::Suv, dec!(150), dec!(22)),
            ],
            commission_rate: dec!(0.15),
            toggles: FeatureToggles::default(),
        }
    }
}

impl AppSettings {
    pub fn fare_rule(&self, class: VehicleClass) -> Option<&FareRule> {
        self.fares.iter().find(|r| r.vehicle_class == class)
    }

    /// Fare for a trip; the base fare alone when the distance is unknown
    pub fn quote_fare(&self, class: VehicleClass, distance_km: Option<f64>) -> Option<Decimal> {
        let rule = self.fare_rule(class)?;
        let distance = distance_km
            .and_then(|d| Decimal::try_from(d).ok())
            .map(|d| d.round_dp(2))
            .unwrap_or(Decimal::ZERO);
        Some((rule.base_fare + rule.per_km * distance).round_dp(2))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(format!(
                "commission_rate must be in [0, 1), got {}",
                self.commission_rate
            ));
        }
        for rule in &self.fares {
            if rule.base_fare < Decimal::ZERO || rule.per_km < Decimal::ZERO {
                return Err(format!(
                    "fares for {:?} must be non-negative",
                    rule.vehicle_class
                ));
            }
        }
        for (i, rule) in self.fares.iter().enumerate() {
            if self.fares[..i]
                .iter()
                .any(|r| r.vehicle_class == rule.vehicle_class)
            {
                return Err(format!(
                    "duplicate fare rule for {:?}",
                    rule.vehicle_class
                ));
            }
        }
        Ok(())
    }
}

/// A stored configuration revision
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub version: i64,
    pub settings: AppSettings,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl AppConfig {
    /// Revision 1, written when the store has no configuration yet
    pub fn initial() -> Self {
        Self {
            version: 1,
            settings: AppSettings::default(),
            updated_by: None,
            updated_at: Utc::now(),
        }
    }
}

/// Partial update; only the given sections change
#[derive(Debug, Deserialize)]
pub struct UpdateAppConfigRequest {
    /// Version the admin edited; stale versions are rejected
    pub expected_version: i64,
    pub fares: Option<Vec<FareRule>>,
    pub commission_rate: Option<Decimal>,
    pub toggles: Option<FeatureToggles>,
}

impl UpdateAppConfigRequest {
    pub fn apply_to(&self, settings: &AppSettings) -> AppSettings {
        AppSettings {
            fares: self.fares.clone().unwrap_or_else(|| settings.fares.clone()),
            commission_rate: self.commission_rate.unwrap_or(settings.commission_rate),
            toggles: self
                .toggles
                .clone()
                .unwrap_or_else(|| settings.toggles.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.commission_rate, dec!(0.15));
        for class in VehicleClass::ALL {
            assert!(settings.fare_rule(class).is_some(), "{:?} has no fare", class);
        }
    }

    #[test]
    fn test_quote_fare_without_distance_is_base_fare() {
        let settings = AppSettings::default();
        assert_eq!(settings.quote_fare(VehicleClass::Sedan, None), Some(dec!(110)));
    }

    #[test]
    fn test_quote_fare_with_distance() {
        let settings = AppSettings::default();
        // 45 + 12 * 10.5
        assert_eq!(
            settings.quote_fare(VehicleClass::Auto, Some(10.5)),
            Some(dec!(171.00))
        );
    }

    #[test]
    fn test_quote_fare_unknown_class() {
        let mut settings = AppSettings::default();
        settings.fares.retain(|r| r.vehicle_class != VehicleClass::Suv);
        assert_eq!(settings.quote_fare(VehicleClass::Suv, Some(3.0)), None);
    }

    #[test]
    fn test_validate_rejects_bad_commission() {
        let mut settings = AppSettings::default();
        settings.commission_rate = dec!(1);
        assert!(settings.validate().is_err());
        settings.commission_rate = dec!(-0.01);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_and_negative_rules() {
        let mut settings = AppSettings::default();
        let dup = settings.fares[0].clone();
        settings.fares.push(dup);
        assert!(settings.validate().is_err());

        let mut settings = AppSettings::default();
        settings.fares[1].per_km = dec!(-1);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_update_keeps_untouched_sections() {
        let settings = AppSettings::default();
        let update = UpdateAppConfigRequest {
            expected_version: 1,
            fares: None,
            commission_rate: Some(dec!(0.2)),
            toggles: None,
        };
        let next = update.apply_to(&settings);
        assert_eq!(next.commission_rate, dec!(0.2));
        assert_eq!(next.fares, settings.fares);
        assert_eq!(next.toggles, settings.toggles);
    }
}

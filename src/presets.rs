//! Named condition presets and scenario bundles.
//!
//! Presets are rows in a static table rather than branches in code: adding a
//! preset is a data insertion. Lookup is case-insensitive.

use crate::{error::ConfigurationError, profile::ConditionProfile};

const NETWORK_UNAVAILABLE: &str = r#"{"error":"Network unavailable"}"#;

/// One row of the preset table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PresetSpec {
    /// Lookup name.
    pub name: &'static str,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Lower jitter bound in milliseconds.
    pub jitter_min_ms: i64,
    /// Upper jitter bound in milliseconds.
    pub jitter_max_ms: i64,
    /// Failure rate outside any peak window.
    pub failure_rate: f64,
    /// `(start_hour, end_hour, rate)` applied inside the peak window.
    pub peak: Option<(u8, u8, f64)>,
    /// Status of injected failures.
    pub failure_status: u16,
    /// Body of injected failures.
    pub failure_body: &'static str,
}

impl PresetSpec {
    const fn delay(name: &'static str, base_delay_ms: u64, jitter: (i64, i64)) -> Self {
        Self {
            name,
            base_delay_ms,
            jitter_min_ms: jitter.0,
            jitter_max_ms: jitter.1,
            failure_rate: 0.0,
            peak: None,
            failure_status: 503,
            failure_body: NETWORK_UNAVAILABLE,
        }
    }

    const fn failing(mut self, rate: f64, status: u16, body: &'static str) -> Self {
        self.failure_rate = rate;
        self.failure_status = status;
        self.failure_body = body;
        self
    }

    const fn peaking(mut self, start_hour: u8, end_hour: u8, rate: f64) -> Self {
        self.peak = Some((start_hour, end_hour, rate));
        self
    }

    /// Build the validated profile for this row.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the row holds invalid values.
    pub fn profile(&self) -> Result<ConditionProfile, ConfigurationError> {
        let builder = ConditionProfile::builder(self.name)
            .base_delay_ms(self.base_delay_ms)
            .jitter_ms(self.jitter_min_ms, self.jitter_max_ms)
            .failure_rate(self.failure_rate)
            .failure_status(self.failure_status)
            .failure_body(self.failure_body);
        let builder = match self.peak {
            Some((start, end, rate)) => builder.peak(start, end, rate),
            None => builder,
        };
        builder.build()
    }
}

const NETWORK_JITTER: (i64, i64) = (0, 800);
const APP_NETWORK_JITTER: (i64, i64) = (-100, 500);

/// Every preset known to the engine.
pub const PRESETS: &[PresetSpec] = &[
    PresetSpec::delay("3g", 1_500, NETWORK_JITTER).failing(0.12, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("4g", 600, NETWORK_JITTER).failing(0.05, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("wifi", 200, NETWORK_JITTER).failing(0.02, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("poor", 3_000, NETWORK_JITTER).failing(0.20, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("mobile", 800, NETWORK_JITTER).failing(0.08, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("app-5g", 100, APP_NETWORK_JITTER).failing(0.01, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("app-4g", 300, APP_NETWORK_JITTER).failing(0.02, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("app-3g", 800, APP_NETWORK_JITTER).failing(0.05, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("app-wifi", 150, APP_NETWORK_JITTER).failing(0.01, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("app-poor", 2_000, APP_NETWORK_JITTER).failing(0.15, 503, NETWORK_UNAVAILABLE),
    PresetSpec::delay("peak-payday", 3_000, (1_000, 3_000))
        .failing(
            0.01,
            503,
            r#"{"error":"Service unavailable - high mobile traffic"}"#,
        )
        .peaking(9, 10, 0.015),
    PresetSpec::delay("payday-friday", 1_500, (0, 2_000))
        .failing(
            0.01,
            500,
            r#"{"error":"Payment processing failed due to high load"}"#,
        )
        .peaking(9, 10, 0.05),
    PresetSpec::delay("payday-authorization", 750, (200, 800)),
    PresetSpec::delay("payday-balance", 500, (100, 400)),
    PresetSpec::delay("extreme-stress", 3_000, (1_000, 3_000)).failing(
        0.10,
        503,
        r#"{"error":"Service temporarily unavailable - high load"}"#,
    ),
    PresetSpec::delay("battery-saving", 1_600, (500, 1_500)),
    PresetSpec::delay("cache-hit", 100, (0, 150)),
    PresetSpec::delay("cache-miss", 800, (0, 1_500)),
    PresetSpec::delay("mobile-payment", 900, (500, 2_000)).failing(
        0.08,
        500,
        r#"{"error":"Mobile payment failed - poor connection"}"#,
    ),
    PresetSpec::delay("mobile-balance", 800, (200, 600)),
    PresetSpec::delay("app-startup", 2_000, (500, 1_500)),
    PresetSpec::delay("data-load", 800, (300, 800)),
    PresetSpec::delay("background-sync", 2_000, (1_000, 3_000)),
    PresetSpec::delay("app-background-sync", 1_200, (1_000, 3_000)),
    PresetSpec::delay("biometric-auth", 1_500, (500, 1_500)),
    PresetSpec::delay("real-app-init", 400, (200, 800)),
    PresetSpec::delay("user-profile", 800, (300, 1_000)),
    PresetSpec::delay("app-config", 400, (100, 500)),
    PresetSpec::delay("banking-accounts", 800, (400, 1_200)),
    PresetSpec::delay("banking-balance", 800, (200, 600)),
    PresetSpec::delay("banking-transactions", 800, (500, 1_500)),
    PresetSpec::delay("banking-payment", 1_600, (1_000, 3_000)).failing(
        0.03,
        503,
        r#"{"error":"Payment service temporarily unavailable"}"#,
    ),
    PresetSpec::delay("banking-transfer", 1_600, (800, 2_000)),
    PresetSpec::delay("product-catalog", 800, (300, 800)),
    PresetSpec::delay("product-details", 800, (200, 600)),
    PresetSpec::delay("shopping-cart", 800, (400, 1_000)),
    PresetSpec::delay("checkout", 2_400, (1_000, 3_000)),
    PresetSpec::delay("notification-register", 800, (200, 600)),
    PresetSpec::delay("notification-fetch", 800, (100, 400)),
    PresetSpec::delay("analytics-track", 50, (50, 200)),
    PresetSpec::delay("crash-report", 800, (200, 500)),
    PresetSpec::delay("image-load", 1_200, (200, 800)),
    PresetSpec::delay("png-load", 1_200, (100, 600)),
    PresetSpec::delay("video-load", 2_400, (500, 1_500)),
];

/// A named group of `(pattern, preset)` routes applied together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioSpec {
    /// Lookup name.
    pub name: &'static str,
    /// Routes in registration order.
    pub routes: &'static [(&'static str, &'static str)],
}

/// Every scenario bundle known to the engine.
pub const SCENARIOS: &[ScenarioSpec] = &[
    ScenarioSpec {
        name: "payday-friday",
        routes: &[
            ("**/api/payments/**", "payday-friday"),
            ("**/api/transactions/authorize/**", "payday-authorization"),
            ("**/api/balance/**", "payday-balance"),
        ],
    },
    ScenarioSpec {
        name: "extreme-payday",
        routes: &[("**/api/payments/**", "extreme-stress")],
    },
    ScenarioSpec {
        name: "mobile-payday",
        routes: &[
            ("**/api/payments/**", "peak-payday"),
            ("**/api/balance/**", "mobile-balance"),
        ],
    },
    ScenarioSpec {
        name: "real-app-caching",
        routes: &[
            ("**/api/cached/**", "cache-hit"),
            ("**/api/uncached/**", "cache-miss"),
        ],
    },
    ScenarioSpec {
        name: "battery-saving",
        routes: &[("**/api/**", "battery-saving")],
    },
    ScenarioSpec {
        name: "mobile-startup",
        routes: &[
            ("**/api/app/init/**", "app-startup"),
            ("**/api/data/load/**", "data-load"),
        ],
    },
    ScenarioSpec {
        name: "real-app-startup",
        routes: &[
            ("**/api/app/init", "real-app-init"),
            ("**/api/user/profile", "user-profile"),
            ("**/api/app/config", "app-config"),
        ],
    },
    ScenarioSpec {
        name: "real-banking",
        routes: &[
            ("**/api/banking/accounts", "banking-accounts"),
            ("**/api/banking/balance", "banking-balance"),
            ("**/api/banking/transactions", "banking-transactions"),
            ("**/api/banking/payment", "banking-payment"),
            ("**/api/banking/transfer", "banking-transfer"),
        ],
    },
    ScenarioSpec {
        name: "real-retail",
        routes: &[
            ("**/api/products", "product-catalog"),
            ("**/api/products/*", "product-details"),
            ("**/api/cart", "shopping-cart"),
            ("**/api/checkout", "checkout"),
        ],
    },
    ScenarioSpec {
        name: "push-notifications",
        routes: &[
            ("**/api/notifications/register", "notification-register"),
            ("**/api/notifications/fetch", "notification-fetch"),
        ],
    },
    ScenarioSpec {
        name: "app-analytics",
        routes: &[
            ("**/api/analytics/track", "analytics-track"),
            ("**/api/crash/report", "crash-report"),
        ],
    },
    ScenarioSpec {
        name: "mobile-payment",
        routes: &[
            ("**/api/payments/mobile/**", "mobile-payment"),
            ("**/api/auth/mobile/biometric/**", "biometric-auth"),
        ],
    },
    ScenarioSpec {
        name: "app-lifecycle",
        routes: &[("**/api/sync/**", "background-sync")],
    },
    ScenarioSpec {
        name: "real-app-sync",
        routes: &[("**/api/sync/**", "app-background-sync")],
    },
    ScenarioSpec {
        name: "media-loading",
        routes: &[
            ("**/*.jpg", "image-load"),
            ("**/*.png", "png-load"),
            ("**/*.mp4", "video-load"),
        ],
    },
];

/// Look up a preset row by name, ignoring ASCII case.
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownPreset`] if no row matches.
pub fn spec(name: &str) -> Result<&'static PresetSpec, ConfigurationError> {
    PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigurationError::UnknownPreset(name.to_owned()))
}

/// Build the profile for the preset called `name`.
///
/// ```
/// let profile = netcondition::presets::preset("3G").expect("known preset");
/// assert_eq!(profile.base_delay().as_millis(), 1_500);
/// ```
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownPreset`] if no row matches.
pub fn preset(name: &str) -> Result<ConditionProfile, ConfigurationError> { spec(name)?.profile() }

/// Look up a scenario bundle by name, ignoring ASCII case.
///
/// # Errors
///
/// Returns [`ConfigurationError::UnknownScenario`] if no bundle matches.
pub fn scenario(name: &str) -> Result<&'static ScenarioSpec, ConfigurationError> {
    SCENARIOS
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigurationError::UnknownScenario(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    #[test]
    fn every_preset_builds() {
        for spec in PRESETS {
            spec.profile()
                .unwrap_or_else(|e| panic!("preset {} invalid: {e}", spec.name));
        }
    }

    #[test]
    fn preset_names_are_unique() {
        let mut names: Vec<_> = PRESETS.iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PRESETS.len());
    }

    #[test]
    fn scenario_routes_reference_known_presets() {
        for scenario in SCENARIOS {
            for (pattern, preset_name) in scenario.routes {
                assert!(spec(preset_name).is_ok(), "{} -> {preset_name}", scenario.name);
                assert!(crate::pattern::RoutePattern::new(pattern).is_ok());
            }
        }
    }

    #[test]
    fn scenario_names_are_unique() {
        let mut names: Vec<_> = SCENARIOS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCENARIOS.len());
    }

    #[test]
    fn every_route_preset_is_used_by_a_bundle() {
        const NETWORK: [&str; 10] = [
            "3g", "4g", "wifi", "poor", "mobile", "app-5g", "app-4g", "app-3g", "app-wifi",
            "app-poor",
        ];
        let unused: Vec<_> = PRESETS
            .iter()
            .map(|p| p.name)
            .filter(|name| !NETWORK.contains(name))
            .filter(|name| !SCENARIOS.iter().any(|s| s.routes.iter().any(|(_, n)| n == name)))
            .collect();
        assert!(unused.is_empty(), "presets without a bundle: {unused:?}");
    }

    #[rstest]
    #[case("3g", 1_500, 0.12)]
    #[case("4g", 600, 0.05)]
    #[case("wifi", 200, 0.02)]
    #[case("poor", 3_000, 0.20)]
    fn network_presets_reproduce_canonical_tuples(
        #[case] name: &str,
        #[case] base_ms: u64,
        #[case] rate: f64,
    ) {
        let profile = preset(name).expect("known preset");
        assert_eq!(profile.base_delay(), Duration::from_millis(base_ms));
        assert!((profile.failure_rate() - rate).abs() < f64::EPSILON);
        assert_eq!(profile.jitter().min_ms(), 0);
        assert_eq!(profile.failure_response().status(), 503);
    }

    #[test]
    fn peak_payday_matches_documented_values() {
        let profile = preset("peak-payday").expect("known preset");
        assert_eq!(profile.base_delay(), Duration::from_millis(3_000));
        assert_eq!(
            (profile.jitter().min_ms(), profile.jitter().max_ms()),
            (1_000, 3_000)
        );
        assert!((profile.failure_rate() - 0.01).abs() < f64::EPSILON);
        let peak = profile.peak().expect("peak window");
        assert_eq!((peak.window().start_hour(), peak.window().end_hour()), (9, 10));
        assert!((peak.failure_rate() - 0.015).abs() < f64::EPSILON);
    }

    #[test]
    fn cache_presets_have_expected_bounds() {
        let hit = preset("cache-hit").expect("known preset").delay_bounds();
        let miss = preset("cache-miss").expect("known preset").delay_bounds();
        assert_eq!(hit, (Duration::from_millis(100), Duration::from_millis(250)));
        assert_eq!(miss, (Duration::from_millis(800), Duration::from_millis(2_300)));
        assert!(hit.1 < miss.0);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            preset("edge"),
            Err(ConfigurationError::UnknownPreset("edge".into()))
        );
        assert!(matches!(
            scenario("nope"),
            Err(ConfigurationError::UnknownScenario(_))
        ));
    }
}

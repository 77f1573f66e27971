//! Lookup table seeding.
//!
//! Module types are keyed by their Wikidata item. Licenses come in two
//! price lists that share names, urls and prices but point at different
//! payment `price_id`s for production and test deployments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{ModuleStore, NewLicense, NewModuleType};

/// Which license price list to seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedEnvironment {
    /// Live payment prices.
    Production,
    /// Test-mode payment prices.
    #[default]
    Test,
}

impl SeedEnvironment {
    /// Parse an environment name. Anything other than `production`
    /// (case-insensitive) selects the test price list.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Test
        }
    }

    /// Environment name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for SeedEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeedEnvironment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

const fn module_type(wikidata: &'static str, name: &'static str) -> NewModuleType {
    NewModuleType { wikidata, name }
}

/// Every module type a module can be published as.
pub const MODULE_TYPES: &[NewModuleType] = &[
    module_type("Q131841", "Idea"),
    module_type("Q1371819", "Plan"),
    module_type("Q17737", "Theory"),
    module_type("Q2412849", "Literature review"),
    module_type("Q321703", "Premise"),
    module_type("Q41719", "Hypothesis"),
    module_type("Q748250", "Prediction"),
    module_type("Q94535766", "Assertion"),
    module_type("Q185698", "Methodology"),
    module_type("Q82604", "Design"),
    module_type("Q41689629", "Procedure"),
    module_type("Q16798631", "Equipment"),
    module_type("Q42848", "Data"),
    module_type("Q1070421", "Script"),
    module_type("Q1347572", "Evidence"),
    module_type("Q217602", "Analysis"),
    module_type("Q17104930", "Outcome"),
    module_type("Q3030248", "Discussion"),
    module_type("Q333291", "Abstract"),
    module_type("Q1318295", "Narrative"),
    module_type("Q604733", "Presentation"),
    module_type("Q265158", "Review"),
    module_type("Q55107540", "Other"),
    module_type("Q947859", "Research proposal"),
    module_type("Q7397", "Software"),
    module_type("Q871232", "Editorial"),
    module_type("Q30849", "Blog"),
    module_type("Q60752967", "Preregistration"),
    module_type("Q429785", "Poster"),
];

const fn license(url: &'static str, name: &'static str, price: i32, price_id: Option<&'static str>) -> NewLicense {
    NewLicense { url, name, price, price_id }
}

const CC0_URL: &str = "https://creativecommons.org/publicdomain/zero/1.0/legalcode";
const CC_BY_URL: &str = "https://creativecommons.org/licenses/by/4.0/legalcode";
const CC_BY_NC_ND_URL: &str = "https://creativecommons.org/licenses/by-nc-nd/4.0/legalcode";
const CC_BY_NC_SA_URL: &str = "https://creativecommons.org/licenses/by-nc-sa/4.0/";
const CC_BY_ND_URL: &str = "https://creativecommons.org/licenses/by-nd/4.0/legalcode";
const CC_BY_NC_URL: &str = "https://creativecommons.org/licenses/by-nc/4.0/legalcode";
const CC_BY_SA_URL: &str = "https://creativecommons.org/licenses/by-sa/4.0/legalcode";
const ALL_RIGHTS_URL: &str = "https://en.wikipedia.org/wiki/All_rights_reserved";

/// Production license price list.
pub const PRODUCTION_LICENSES: &[NewLicense] = &[
    license(CC0_URL, "CC0 Public Domain Dedication", 0, None),
    license(CC_BY_URL, "CC BY 4.0", 0, None),
    license(CC_BY_NC_ND_URL, "CC BY-NC-ND 4.0", 42999, Some("price_1KCTCfLmgtJbKHNGKwS8Da2l")),
    license(CC_BY_NC_SA_URL, "CC BY-NC-SA 4.0", 32999, Some("price_1KCTCgLmgtJbKHNGFMFbG3zs")),
    license(CC_BY_ND_URL, "CC BY-ND 4.0", 24999, Some("price_1KCTCiLmgtJbKHNGdXWdgVY9")),
    license(CC_BY_NC_URL, "CC BY-NC 4.0", 19499, Some("price_1KCTCjLmgtJbKHNG6G1nkZYe")),
    license(CC_BY_SA_URL, "CC BY-SA 4.0", 14999, Some("price_1KCTCcLmgtJbKHNGbu2vXiYR")),
    license(ALL_RIGHTS_URL, "All rights reserved", 54999, Some("price_1KCTBbLmgtJbKHNGQSZHsNO0")),
];

/// Test-mode license price list.
pub const TEST_LICENSES: &[NewLicense] = &[
    license(CC0_URL, "CC0 Public Domain Dedication", 0, None),
    license(CC_BY_URL, "CC BY 4.0", 0, None),
    license(CC_BY_NC_ND_URL, "CC BY-NC-ND 4.0", 42999, Some("price_1KCRaTLmgtJbKHNG9WZlp04W")),
    license(CC_BY_NC_SA_URL, "CC BY-NC-SA 4.0", 32999, Some("price_1KCRaqLmgtJbKHNGoj6TG4BQ")),
    license(CC_BY_ND_URL, "CC BY-ND 4.0", 24999, Some("price_1KCRbQLmgtJbKHNGQtGY2BtP")),
    license(CC_BY_NC_URL, "CC BY-NC 4.0", 19499, Some("price_1KCRdCLmgtJbKHNGop8lJ0r5")),
    license(CC_BY_SA_URL, "CC BY-SA 4.0", 14999, Some("price_1KCMOZLmgtJbKHNGvjMirRp0")),
    license(ALL_RIGHTS_URL, "All rights reserved", 54999, Some("price_1KCRbjLmgtJbKHNGLa8TS0aH")),
];

/// License price list for `env`.
pub fn licenses(env: SeedEnvironment) -> &'static [NewLicense] {
    match env {
        SeedEnvironment::Production => PRODUCTION_LICENSES,
        SeedEnvironment::Test => TEST_LICENSES,
    }
}

/// Rows inserted by a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    /// New module type rows.
    pub module_types_inserted: u64,
    /// New license rows.
    pub licenses_inserted: u64,
}

impl SeedReport {
    /// True when the run found every row already present.
    pub fn is_noop(&self) -> bool {
        self.module_types_inserted == 0 && self.licenses_inserted == 0
    }
}

/// Error type for seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// Store error.
    #[error("Store error: {0}")]
    StoreError(String),
}

/// Seed module types, then the license list for `env`.
///
/// Existing rows are skipped, so running twice inserts nothing the
/// second time.
pub async fn seed<S: ModuleStore>(store: &S, env: SeedEnvironment) -> Result<SeedReport, SeedError> {
    let module_types_inserted = store.insert_module_types(MODULE_TYPES).await
        .map_err(|e| SeedError::StoreError(e.to_string()))?;
    let licenses_inserted = store.insert_licenses(licenses(env)).await
        .map_err(|e| SeedError::StoreError(e.to_string()))?;

    let report = SeedReport { module_types_inserted, licenses_inserted };
    tracing::info!(
        environment = %env,
        module_types = report.module_types_inserted,
        licenses = report.licenses_inserted,
        "Seeded lookup tables"
    );
    Ok(report)
}

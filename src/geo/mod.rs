//! Geolocation and network operator annotation for hop addresses

pub mod database;
pub mod isp;
pub mod resolver;

pub use database::{locate_db_dir, GeoDatabase, LookupError, MaxMindDatabase};
pub use isp::{classify, IspLabel};
pub use resolver::GeoResolver;

use serde::{Deserialize, Serialize};

/// File name of the ASN database
pub const ASN_DB_FILE: &str = "GeoLite2-ASN.mmdb";
/// File name of the city database
pub const CITY_DB_FILE: &str = "GeoLite2-City.mmdb";
/// File name of the optional district database
pub const DISTRICT_DB_FILE: &str = "district.mmdb";

/// Locale variables consulted for the default geo mode, highest priority first
const LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

/// How hop locations are looked up and rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoMode {
    /// Country code, subdivision code and English city name
    #[default]
    City,
    /// Localized Chinese place names
    District,
}

impl GeoMode {
    /// Pick the mode matching a locale string such as `zh_CN.UTF-8`
    pub fn from_locale(locale: &str) -> Self {
        if locale.to_ascii_lowercase().contains("zh") {
            GeoMode::District
        } else {
            GeoMode::City
        }
    }

    /// Detect the mode from the process locale
    ///
    /// The first non-empty variable of `LC_ALL`, `LC_MESSAGES` and `LANG`
    /// decides, as the C library does.
    pub fn detect() -> Self {
        LOCALE_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .map_or(GeoMode::City, |locale| Self::from_locale(&locale))
    }
}

/// Geo and operator annotation of one address
///
/// Every field may be empty; an all-empty record is what loopback and
/// unspecified addresses resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Organization operating the autonomous system
    pub asn_organization: String,
    /// Autonomous system number, 0 when unknown
    pub asn_number: u32,
    /// ISO country code
    pub country_code: String,
    /// ISO code of the most specific subdivision (city mode)
    pub subdivision_code: String,
    /// English city name (city mode)
    pub city_name: String,
    /// Space-separated localized place names (district mode)
    pub district_label: String,
}

impl GeoRecord {
    /// Check if nothing at all is known about the address
    pub fn is_empty(&self) -> bool {
        self.asn_organization.is_empty()
            && self.asn_number == 0
            && self.country_code.is_empty()
            && self.subdivision_code.is_empty()
            && self.city_name.is_empty()
            && self.district_label.is_empty()
    }

    /// Check if the ASN lookup produced anything
    pub fn has_asn(&self) -> bool {
        self.asn_number != 0 || !self.asn_organization.is_empty()
    }

    /// Chinese carrier label derived from the ASN organization
    pub fn carrier(&self) -> Option<IspLabel> {
        let organization = Some(self.asn_organization.as_str()).filter(|o| !o.is_empty());
        classify(organization, &self.country_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_mode_from_locale() {
        assert_eq!(GeoMode::from_locale("zh_CN.UTF-8"), GeoMode::District);
        assert_eq!(GeoMode::from_locale("zh-Hans"), GeoMode::District);
        assert_eq!(GeoMode::from_locale("en_US.UTF-8"), GeoMode::City);
        assert_eq!(GeoMode::from_locale("C"), GeoMode::City);
        assert_eq!(GeoMode::from_locale(""), GeoMode::City);
    }

    #[test]
    fn test_empty_record() {
        let record = GeoRecord::default();
        assert!(record.is_empty());
        assert!(!record.has_asn());
        assert_eq!(record.carrier(), None);
    }

    #[test]
    fn test_carrier_from_record() {
        let record = GeoRecord {
            asn_organization: "China Unicom Beijing Province Network".to_string(),
            asn_number: 4808,
            country_code: "CN".to_string(),
            ..GeoRecord::default()
        };
        assert!(!record.is_empty());
        assert_eq!(record.carrier(), Some(IspLabel::Unicom));

        let abroad = GeoRecord {
            country_code: "HK".to_string(),
            ..record
        };
        assert_eq!(abroad.carrier(), None);
    }

    #[test]
    fn test_serialize_mode() {
        assert_eq!(serde_json::to_string(&GeoMode::District).unwrap(), "\"district\"");
    }
}

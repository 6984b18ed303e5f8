//! Geo database lookups
//!
//! [`GeoDatabase`] is the seam between the resolver and the on-disk
//! databases. [`MaxMindDatabase`] reads MaxMind `.mmdb` files; a file that
//! is missing or unreadable only disables the lookups that need it.

use super::{ASN_DB_FILE, CITY_DB_FILE, DISTRICT_DB_FILE};
use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Locale used for district names
pub const DISTRICT_LOCALE: &str = "zh-CN";

/// Locale used for city names in city mode
const CITY_LOCALE: &str = "en";

/// Errors from a single database lookup
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The address is not in the database
    #[error("address not found")]
    NotFound,

    /// The database needed for this lookup is not loaded
    #[error("{0} database unavailable")]
    Unavailable(&'static str),

    /// The database record could not be decoded
    #[error("failed to decode record: {0}")]
    Decode(String),
}

impl From<MaxMindDBError> for LookupError {
    fn from(err: MaxMindDBError) -> Self {
        match err {
            MaxMindDBError::AddressNotFoundError(_) => LookupError::NotFound,
            other => LookupError::Decode(other.to_string()),
        }
    }
}

/// Autonomous system an address belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnRecord {
    /// Autonomous system number, 0 when unknown
    pub number: u32,
    /// Organization operating the autonomous system
    pub organization: Option<String>,
}

/// Country, subdivision and city of an address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityRecord {
    /// ISO country code
    pub country_code: String,
    /// ISO code of the most specific subdivision
    pub subdivision_code: String,
    /// City name in English
    pub city_name: String,
}

/// Localized place names of an address, country first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistrictRecord {
    /// ISO country code from the same record
    pub country_code: String,
    /// Country, subdivision and city names, possibly repeating
    pub names: Vec<String>,
}

/// Read access to the ASN, city and district databases
///
/// Lookups are blocking and must be safe to run from several threads.
pub trait GeoDatabase: Send + Sync {
    /// Look up the autonomous system of `addr`
    fn asn(&self, addr: IpAddr) -> Result<AsnRecord, LookupError>;

    /// Look up the location of `addr` for city mode
    fn city(&self, addr: IpAddr) -> Result<CityRecord, LookupError>;

    /// Look up the localized place names of `addr` for district mode
    fn district(&self, addr: IpAddr) -> Result<DistrictRecord, LookupError>;
}

/// MaxMind `.mmdb` backed database
pub struct MaxMindDatabase {
    asn: Option<Reader<Vec<u8>>>,
    city: Option<Reader<Vec<u8>>>,
    district: Option<Reader<Vec<u8>>>,
}

impl MaxMindDatabase {
    /// Open the databases in `dir`
    ///
    /// Files that cannot be opened are logged and skipped, so this never
    /// fails; lookups against a missing file return
    /// [`LookupError::Unavailable`].
    pub fn open(dir: &Path) -> Self {
        Self {
            asn: open_reader(&dir.join(ASN_DB_FILE)),
            city: open_reader(&dir.join(CITY_DB_FILE)),
            district: open_optional_reader(&dir.join(DISTRICT_DB_FILE)),
        }
    }

    /// Whether no database at all could be opened
    pub fn is_empty(&self) -> bool {
        self.asn.is_none() && self.city.is_none() && self.district.is_none()
    }
}

fn open_reader(path: &Path) -> Option<Reader<Vec<u8>>> {
    match Reader::open_readfile(path) {
        Ok(reader) => {
            log::debug!("Loaded geo database {}", path.display());
            Some(reader)
        }
        Err(e) => {
            log::warn!("Geo database {} unavailable: {}", path.display(), e);
            None
        }
    }
}

/// Like [`open_reader`], but a missing file is expected and not warned about
fn open_optional_reader(path: &Path) -> Option<Reader<Vec<u8>>> {
    if !path.exists() {
        log::debug!("No district database at {}", path.display());
        return None;
    }
    open_reader(path)
}

fn localized<'a>(names: Option<&BTreeMap<&'a str, &'a str>>, locale: &str) -> Option<&'a str> {
    names.and_then(|n| n.get(locale)).copied()
}

fn district_from_city(city: &geoip2::City<'_>) -> DistrictRecord {
    let country = city.country.as_ref();
    let mut names = Vec::new();

    if let Some(name) = localized(country.and_then(|c| c.names.as_ref()), DISTRICT_LOCALE) {
        names.push(name.to_string());
    }
    for subdivision in city.subdivisions.iter().flatten() {
        if let Some(name) = localized(subdivision.names.as_ref(), DISTRICT_LOCALE) {
            names.push(name.to_string());
        }
    }
    if let Some(name) = localized(
        city.city.as_ref().and_then(|c| c.names.as_ref()),
        DISTRICT_LOCALE,
    ) {
        names.push(name.to_string());
    }

    DistrictRecord {
        country_code: country
            .and_then(|c| c.iso_code)
            .unwrap_or_default()
            .to_string(),
        names,
    }
}

impl GeoDatabase for MaxMindDatabase {
    fn asn(&self, addr: IpAddr) -> Result<AsnRecord, LookupError> {
        let reader = self.asn.as_ref().ok_or(LookupError::Unavailable("ASN"))?;
        let asn: geoip2::Asn = reader.lookup(addr)?;
        Ok(AsnRecord {
            number: asn.autonomous_system_number.unwrap_or_default(),
            organization: asn.autonomous_system_organization.map(str::to_string),
        })
    }

    fn city(&self, addr: IpAddr) -> Result<CityRecord, LookupError> {
        let reader = self.city.as_ref().ok_or(LookupError::Unavailable("city"))?;
        let city: geoip2::City = reader.lookup(addr)?;

        let country_code = city
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .unwrap_or_default();
        let subdivision_code = city
            .subdivisions
            .as_ref()
            .and_then(|s| s.last())
            .and_then(|s| s.iso_code)
            .unwrap_or_default();
        let city_name = localized(
            city.city.as_ref().and_then(|c| c.names.as_ref()),
            CITY_LOCALE,
        )
        .unwrap_or_default();

        Ok(CityRecord {
            country_code: country_code.to_string(),
            subdivision_code: subdivision_code.to_string(),
            city_name: city_name.to_string(),
        })
    }

    fn district(&self, addr: IpAddr) -> Result<DistrictRecord, LookupError> {
        let reader = self
            .district
            .as_ref()
            .or(self.city.as_ref())
            .ok_or(LookupError::Unavailable("district"))?;
        let city: geoip2::City = reader.lookup(addr)?;
        Ok(district_from_city(&city))
    }
}

/// Find the directory holding the geo databases
///
/// An explicit directory always wins. Otherwise the executable's directory
/// is used if it contains the ASN or city database, then the current
/// working directory.
pub fn locate_db_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    if let Some(dir) = exe_dir {
        if dir.join(ASN_DB_FILE).exists() || dir.join(CITY_DB_FILE).exists() {
            return dir;
        }
    }

    PathBuf::from(".")
}

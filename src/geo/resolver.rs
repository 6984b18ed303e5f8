//! Per-address geo resolution

use super::database::{GeoDatabase, LookupError};
use super::{GeoMode, GeoRecord};
use crate::trace_time;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::task::JoinError;

/// Resolves addresses to [`GeoRecord`]s through a shared database
#[derive(Clone)]
pub struct GeoResolver {
    db: Arc<dyn GeoDatabase>,
    verbose: u8,
}

/// Location half of a resolution
enum Location {
    City {
        country_code: String,
        subdivision_code: String,
        city_name: String,
    },
    District {
        country_code: String,
        label: String,
    },
}

impl GeoResolver {
    /// Create a resolver reading from `db`
    pub fn new(db: Arc<dyn GeoDatabase>, verbose: u8) -> Self {
        Self { db, verbose }
    }

    /// Resolve `addr` to its ASN and location
    ///
    /// Loopback and unspecified addresses resolve to an empty record without
    /// touching the database. The ASN and location lookups run concurrently
    /// on the blocking pool; a failure in either only empties its own fields.
    pub async fn resolve(&self, addr: IpAddr, mode: GeoMode) -> GeoRecord {
        if addr.is_loopback() || addr.is_unspecified() {
            return GeoRecord::default();
        }

        let asn_db = Arc::clone(&self.db);
        let location_db = Arc::clone(&self.db);
        let (asn, location) = tokio::join!(
            tokio::task::spawn_blocking(move || asn_db.asn(addr)),
            tokio::task::spawn_blocking(move || lookup_location(location_db.as_ref(), addr, mode)),
        );

        let asn = self.settle(addr, "ASN", asn).unwrap_or_default();
        let location = self.settle(addr, "location", location);

        let mut record = GeoRecord {
            asn_organization: asn.organization.unwrap_or_default(),
            asn_number: asn.number,
            ..GeoRecord::default()
        };
        match location {
            Some(Location::City {
                country_code,
                subdivision_code,
                city_name,
            }) => {
                record.country_code = country_code;
                record.subdivision_code = subdivision_code;
                record.city_name = city_name;
            }
            Some(Location::District {
                country_code,
                label,
            }) => {
                record.country_code = country_code;
                record.district_label = label;
            }
            None => {}
        }
        record
    }

    /// Flatten a joined lookup, logging whatever went wrong
    fn settle<T>(
        &self,
        addr: IpAddr,
        what: &str,
        joined: Result<Result<T, LookupError>, JoinError>,
    ) -> Option<T> {
        match joined {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                trace_time!(self.verbose, "{} lookup for {} failed: {}", what, addr, e);
                None
            }
            Err(e) => {
                trace_time!(self.verbose, "{} lookup task for {} failed: {}", what, addr, e);
                None
            }
        }
    }
}

fn lookup_location(
    db: &dyn GeoDatabase,
    addr: IpAddr,
    mode: GeoMode,
) -> Result<Location, LookupError> {
    match mode {
        GeoMode::City => {
            let city = db.city(addr)?;
            Ok(Location::City {
                country_code: city.country_code,
                subdivision_code: city.subdivision_code,
                city_name: city.city_name,
            })
        }
        GeoMode::District => {
            let district = db.district(addr)?;
            Ok(Location::District {
                country_code: district.country_code,
                label: district_label(&district.names),
            })
        }
    }
}

/// Join place names with single spaces, dropping repeats and blanks
pub fn district_label(names: &[String]) -> String {
    let mut unique: Vec<&str> = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique.join(" ")
}

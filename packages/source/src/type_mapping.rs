//! Feed category string -> canonical taxonomy mapping.
//!
//! The feed reports free-form uppercase category strings (e.g.
//! `"MOTOR VEHICLE THEFT"`, `"CRIMINAL DAMAGE"`). This module maps them
//! into [`IncidentCategory`]; unmapped strings land in
//! [`IncidentCategory::Other`] and keep their raw text on the incident.

use crime_brief_models::IncidentCategory;

/// Maps a feed category string to the canonical taxonomy.
#[must_use]
pub fn map_category(raw: &str) -> IncidentCategory {
    let upper = raw.to_uppercase();

    // Order matters: "MOTOR VEHICLE THEFT" contains "THEFT".
    if upper.contains("MOTOR VEHICLE THEFT") || upper.contains("VEHICLE - STOLEN") {
        return IncidentCategory::MotorVehicleTheft;
    }
    if upper.contains("THEFT") || upper.contains("LARCENY") {
        return IncidentCategory::Theft;
    }
    if upper.contains("BURGLARY") {
        return IncidentCategory::Burglary;
    }
    if upper.contains("ROBBERY") {
        return IncidentCategory::Robbery;
    }
    if upper.contains("BATTERY") {
        return IncidentCategory::Battery;
    }
    if upper.contains("ASSAULT") {
        return IncidentCategory::Assault;
    }
    if upper.contains("CRIMINAL DAMAGE") || upper.contains("VANDALISM") {
        return IncidentCategory::CriminalDamage;
    }
    if upper.contains("NARCOTIC") || upper.contains("DRUG") {
        return IncidentCategory::Narcotics;
    }
    if upper.contains("WEAPON") {
        return IncidentCategory::WeaponsViolation;
    }
    if upper.contains("HOMICIDE") || upper.contains("MURDER") {
        return IncidentCategory::Homicide;
    }

    IncidentCategory::Other
}

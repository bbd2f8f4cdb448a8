//! Supported countries and the local calendar date for each of them.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

#[derive(Debug)]
pub struct Country {
    pub code: &'static str,
    pub name: &'static str,
    pub timezone: &'static str,
}

pub const COUNTRIES: &[Country] = &[
    Country {
        code: "AR",
        name: "Argentina",
        timezone: "America/Argentina/Buenos_Aires",
    },
    Country {
        code: "MX",
        name: "México",
        timezone: "America/Mexico_City",
    },
    Country {
        code: "ES",
        name: "España",
        timezone: "Europe/Madrid",
    },
    Country {
        code: "CL",
        name: "Chile",
        timezone: "America/Santiago",
    },
    Country {
        code: "PE",
        name: "Perú",
        timezone: "America/Lima",
    },
    Country {
        code: "CO",
        name: "Colombia",
        timezone: "America/Bogota",
    },
];

pub fn find_country(code: &str) -> Option<&'static Country> {
    let code = code.trim();
    COUNTRIES
        .iter()
        .find(|country| country.code.eq_ignore_ascii_case(code))
}

/// Unknown zones fall back to UTC.
pub fn zone_for(timezone: &str) -> Tz {
    timezone.parse::<Tz>().unwrap_or(Tz::UTC)
}

pub fn today_in(timezone: &str) -> NaiveDate {
    date_in(timezone, Utc::now())
}

pub fn date_in(timezone: &str, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&zone_for(timezone)).date_naive()
}

//! Country code normalization.

/// ISO 3166-1 alpha-3 codes with their alpha-2 equivalents.
const ALPHA3_TO_ALPHA2: &[(&str, &str)] = &[
    ("ARE", "AE"),
    ("ARG", "AR"),
    ("AUS", "AU"),
    ("AUT", "AT"),
    ("BEL", "BE"),
    ("BGD", "BD"),
    ("BRA", "BR"),
    ("CAN", "CA"),
    ("CHE", "CH"),
    ("CHL", "CL"),
    ("CHN", "CN"),
    ("COL", "CO"),
    ("CZE", "CZ"),
    ("DEU", "DE"),
    ("DNK", "DK"),
    ("DZA", "DZ"),
    ("EGY", "EG"),
    ("ESP", "ES"),
    ("FIN", "FI"),
    ("FRA", "FR"),
    ("GBR", "GB"),
    ("GRC", "GR"),
    ("IDN", "ID"),
    ("IND", "IN"),
    ("IRL", "IE"),
    ("IRN", "IR"),
    ("IRQ", "IQ"),
    ("ISL", "IS"),
    ("ITA", "IT"),
    ("JPN", "JP"),
    ("KAZ", "KZ"),
    ("KEN", "KE"),
    ("KOR", "KR"),
    ("MAR", "MA"),
    ("MEX", "MX"),
    ("MYS", "MY"),
    ("NGA", "NG"),
    ("NLD", "NL"),
    ("NOR", "NO"),
    ("NZL", "NZ"),
    ("PAK", "PK"),
    ("PER", "PE"),
    ("PHL", "PH"),
    ("POL", "PL"),
    ("PRT", "PT"),
    ("ROU", "RO"),
    ("RUS", "RU"),
    ("SAU", "SA"),
    ("SGP", "SG"),
    ("SWE", "SE"),
    ("THA", "TH"),
    ("TUR", "TR"),
    ("TWN", "TW"),
    ("UKR", "UA"),
    ("USA", "US"),
    ("VEN", "VE"),
    ("VNM", "VN"),
    ("ZAF", "ZA"),
];

/// Normalize a country code: known alpha-3 codes map to alpha-2; anything
/// else is trimmed, uppercased and passed through.
///
/// ```
/// use gridline::aggregate::normalize_country;
///
/// assert_eq!(normalize_country("usa"), "US");
/// assert_eq!(normalize_country(" gb "), "GB");
/// assert_eq!(normalize_country("XKX"), "XKX");
/// ```
pub fn normalize_country(code: &str) -> String {
    let upper = code.trim().to_ascii_uppercase();
    ALPHA3_TO_ALPHA2
        .iter()
        .find(|(alpha3, _)| *alpha3 == upper)
        .map(|(_, alpha2)| (*alpha2).to_string())
        .unwrap_or(upper)
}

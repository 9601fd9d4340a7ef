//! District attribute key detection
//!
//! Electoral offices publish district layers with differing column names.
//! `detect` picks the column holding the district name and the one holding
//! the district number from a ranked list of known spellings.

/// Key reported when no column matches
pub const UNKNOWN_KEY: &str = "unknown";

/// Known spellings of the district name column, best first
pub const NAME_CANDIDATES: &[&str] = &[
    "wkr_name",
    "wahlkreisname",
    "gen",
    "bez",
    "name",
    "kreis_name",
    "wahlkreis",
    "lwk_name",
];

/// Known spellings of the district number column, best first
pub const ID_CANDIDATES: &[&str] = &["wkr_nr", "wahlkreisnummer", "nummer", "wk_nr", "nr", "lwk"];

/// Columns chosen for a district layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictKeys {
    pub name_key: String,
    pub id_key: String,

    /// Columns containing a name candidate; only filled when `name_key` is unknown
    pub name_suggestions: Vec<String>,

    /// Columns containing a number candidate; only filled when `id_key` is unknown
    pub id_suggestions: Vec<String>,
}

impl DistrictKeys {
    /// Both keys were found
    pub fn is_complete(&self) -> bool {
        self.name_key != UNKNOWN_KEY && self.id_key != UNKNOWN_KEY
    }
}

/// Detect the name and number columns of a district layer schema
pub fn detect<S: AsRef<str>>(schema: &[S]) -> DistrictKeys {
    let name_key = exact_match(schema, NAME_CANDIDATES);
    let id_key = exact_match(schema, ID_CANDIDATES);

    let name_suggestions = match name_key {
        Some(_) => Vec::new(),
        None => partial_matches(schema, NAME_CANDIDATES),
    };
    let id_suggestions = match id_key {
        Some(_) => Vec::new(),
        None => partial_matches(schema, ID_CANDIDATES),
    };

    if name_key.is_none() || id_key.is_none() {
        let columns: Vec<&str> = schema.iter().map(AsRef::as_ref).collect();
        tracing::info!("District columns could not be identified; available: {:?}", columns);
        if name_key.is_none() {
            tracing::info!("Possible name columns: {:?}", name_suggestions);
        }
        if id_key.is_none() {
            tracing::info!("Possible number columns: {:?}", id_suggestions);
        }
    }

    DistrictKeys {
        name_key: name_key.unwrap_or(UNKNOWN_KEY).to_string(),
        id_key: id_key.unwrap_or(UNKNOWN_KEY).to_string(),
        name_suggestions,
        id_suggestions,
    }
}

/// Highest-ranked candidate present in the schema; schema order breaks ties
fn exact_match<'a, S: AsRef<str>>(schema: &'a [S], candidates: &[&str]) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        schema
            .iter()
            .map(AsRef::as_ref)
            .find(|column| column.eq_ignore_ascii_case(candidate))
    })
}

fn partial_matches<S: AsRef<str>>(schema: &[S], candidates: &[&str]) -> Vec<String> {
    schema
        .iter()
        .map(AsRef::as_ref)
        .filter(|column| {
            let lower = column.to_lowercase();
            candidates.iter().any(|candidate| lower.contains(candidate))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_federal_columns() {
        let keys = detect(&["WKR_NR", "WKR_NAME"]);

        assert_eq!(keys.name_key, "WKR_NAME");
        assert_eq!(keys.id_key, "WKR_NR");
        assert!(keys.is_complete());
        assert!(keys.name_suggestions.is_empty());
    }

    #[test]
    fn test_no_match_is_unknown() {
        let keys = detect(&["foo", "bar"]);

        assert_eq!(keys.name_key, UNKNOWN_KEY);
        assert_eq!(keys.id_key, UNKNOWN_KEY);
        assert!(!keys.is_complete());
        assert!(keys.name_suggestions.is_empty());
        assert!(keys.id_suggestions.is_empty());
    }

    #[test]
    fn test_rank_beats_schema_order() {
        // "name" ranks below "wkr_name" even though it comes first
        let keys = detect(&["Name", "Nr", "WKR_Name", "Nummer"]);

        assert_eq!(keys.name_key, "WKR_Name");
        assert_eq!(keys.id_key, "Nummer");
    }

    #[test]
    fn test_schema_order_breaks_case_ties() {
        let keys = detect(&["GEN", "gen", "NR", "nr"]);

        assert_eq!(keys.name_key, "GEN");
        assert_eq!(keys.id_key, "NR");
    }

    #[test]
    fn test_state_columns() {
        let keys = detect(&["LWK", "LWK_NAME", "Shape_Area"]);

        assert_eq!(keys.name_key, "LWK_NAME");
        assert_eq!(keys.id_key, "LWK");
    }

    #[test]
    fn test_partial_matches_are_only_suggested() {
        let keys = detect(&["STIMMBEZIRK_NAME", "GEBIET_NR_2021", "FLAECHE"]);

        assert_eq!(keys.name_key, UNKNOWN_KEY);
        assert_eq!(keys.id_key, UNKNOWN_KEY);
        assert_eq!(keys.name_suggestions, vec!["STIMMBEZIRK_NAME".to_string()]);
        assert_eq!(keys.id_suggestions, vec!["GEBIET_NR_2021".to_string()]);
    }

    #[test]
    fn test_keys_detected_independently() {
        let keys = detect(&["wahlkreis", "flaeche"]);

        assert_eq!(keys.name_key, "wahlkreis");
        assert_eq!(keys.id_key, UNKNOWN_KEY);
        assert!(!keys.is_complete());
        assert!(keys.name_suggestions.is_empty());
    }

    #[test]
    fn test_detect_is_deterministic() {
        let schema = vec!["Wahlkreisnummer".to_string(), "Wahlkreisname".to_string()];
        assert_eq!(detect(&schema), detect(&schema));
        assert_eq!(detect(&schema).name_key, "Wahlkreisname");
        assert_eq!(detect(&schema).id_key, "Wahlkreisnummer");
    }
}

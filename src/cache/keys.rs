//! Index Key Scheme
//!
//! Pure functions mapping a query dimension and value to a cache key name.
//! Values are used verbatim; callers keep case and format consistent
//! between the write and read paths.

use crate::domain::Person;

/// Key of the index holding every cached entry
pub const ALL_PEOPLE: &str = "all_people";

/// Prefix of cache entry keys (`person_{id}_{national_id}`)
pub const ENTRY_PREFIX: &str = "person_";

/// Prefix of the national id index keys
pub const BY_NATIONAL_ID_PREFIX: &str = "person_by_cpf_";

pub const BY_CITY_PREFIX: &str = "people_by_city_";
pub const BY_STATE_PREFIX: &str = "people_by_state_";
pub const BY_COUNTRY_PREFIX: &str = "people_by_country_";

/// Glob patterns removed when a buffer is cleared. [`ALL_PEOPLE`] matches
/// none of them and is deleted by name.
pub const CLEAR_PATTERNS: [&str; 3] = ["person_*", "people_by_*", "person_by_cpf_*"];

/// Query dimension of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryDimension {
    All,
    NationalId,
    City,
    State,
    Country,
}

impl QueryDimension {
    /// Index key for this dimension. `value` is ignored for [`QueryDimension::All`].
    pub fn index_key(self, value: &str) -> String {
        match self {
            QueryDimension::All => all(),
            QueryDimension::NationalId => by_national_id(value),
            QueryDimension::City => by_city(value),
            QueryDimension::State => by_state(value),
            QueryDimension::Country => by_country(value),
        }
    }
}

impl std::fmt::Display for QueryDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryDimension::All => write!(f, "all"),
            QueryDimension::NationalId => write!(f, "cpf"),
            QueryDimension::City => write!(f, "city"),
            QueryDimension::State => write!(f, "state"),
            QueryDimension::Country => write!(f, "country"),
        }
    }
}

pub fn all() -> String {
    ALL_PEOPLE.to_string()
}

pub fn by_national_id(value: &str) -> String {
    format!("{}{}", BY_NATIONAL_ID_PREFIX, value)
}

pub fn by_city(value: &str) -> String {
    format!("{}{}", BY_CITY_PREFIX, value)
}

pub fn by_state(value: &str) -> String {
    format!("{}{}", BY_STATE_PREFIX, value)
}

pub fn by_country(value: &str) -> String {
    format!("{}{}", BY_COUNTRY_PREFIX, value)
}

/// Key of the cache entry holding one serialized person.
pub fn entry_key(id: i64, national_id: &str) -> String {
    format!("{}{}_{}", ENTRY_PREFIX, id, national_id)
}

/// Every index a person belongs to, in write order.
///
/// Address dimensions are included only for fields that are present.
pub fn index_keys_for(person: &Person) -> Vec<String> {
    let mut keys = Vec::with_capacity(5);
    keys.push(all());

    if let Some(city) = person.city() {
        keys.push(by_city(city));
    }
    if let Some(state) = person.state() {
        keys.push(by_state(state));
    }
    if let Some(country) = person.country() {
        keys.push(by_country(country));
    }

    keys.push(by_national_id(&person.national_id));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    #[test]
    fn test_fixed_key_formats() {
        assert_eq!(all(), "all_people");
        assert_eq!(by_national_id("123.456.789-00"), "person_by_cpf_123.456.789-00");
        assert_eq!(by_city("São Paulo"), "people_by_city_São Paulo");
        assert_eq!(by_state("SP"), "people_by_state_SP");
        assert_eq!(by_country("Brasil"), "people_by_country_Brasil");
        assert_eq!(entry_key(42, "123.456.789-00"), "person_42_123.456.789-00");
    }

    #[test]
    fn test_dimension_index_key() {
        assert_eq!(QueryDimension::All.index_key("ignored"), "all_people");
        assert_eq!(QueryDimension::City.index_key("Recife"), "people_by_city_Recife");
        assert_eq!(
            QueryDimension::NationalId.index_key("1"),
            "person_by_cpf_1"
        );
    }

    #[test]
    fn test_values_are_not_normalized() {
        assert_ne!(by_city("recife"), by_city("Recife"));
        assert_ne!(by_city(" Recife"), by_city("Recife"));
    }

    #[test]
    fn test_index_keys_for_full_address() {
        let person = Person::new(
            1,
            "Ana",
            "123.456.789-00",
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        )
        .with_address(Address::new("Brasil", "SP", "São Paulo"));

        assert_eq!(
            index_keys_for(&person),
            vec![
                "all_people".to_string(),
                "people_by_city_São Paulo".to_string(),
                "people_by_state_SP".to_string(),
                "people_by_country_Brasil".to_string(),
                "person_by_cpf_123.456.789-00".to_string(),
            ]
        );
    }

    #[test]
    fn test_index_keys_for_partial_address() {
        let person = Person::new(
            2,
            "Bruno",
            "987.654.321-00",
            NaiveDate::from_ymd_opt(1980, 6, 1).unwrap(),
        )
        .with_address(Address {
            country: Some("Brasil".to_string()),
            ..Default::default()
        });

        let keys = index_keys_for(&person);
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&"people_by_country_Brasil".to_string()));
        assert!(!keys.iter().any(|k| k.starts_with(BY_CITY_PREFIX)));
    }

    #[test]
    fn test_index_keys_without_address() {
        let person = Person::new(
            3,
            "Carla",
            "111.222.333-44",
            NaiveDate::from_ymd_opt(2000, 2, 29).unwrap(),
        );

        assert_eq!(
            index_keys_for(&person),
            vec!["all_people".to_string(), "person_by_cpf_111.222.333-44".to_string()]
        );
    }

    proptest! {
        #[test]
        fn prop_index_key_is_deterministic(value in ".*") {
            for dimension in [
                QueryDimension::NationalId,
                QueryDimension::City,
                QueryDimension::State,
                QueryDimension::Country,
            ] {
                let first = dimension.index_key(&value);
                prop_assert_eq!(&first, &dimension.index_key(&value));
                prop_assert!(first.ends_with(&value));
            }
        }

        #[test]
        fn prop_entry_keys_match_clear_pattern(id in any::<i64>(), national_id in "[0-9.-]{1,14}") {
            let key = entry_key(id, &national_id);
            prop_assert!(key.starts_with(ENTRY_PREFIX));
        }
    }
}

//! Property-Based Tests for the Record Codec
//!
//! # Test Properties
//!
//! 1. **Roundtrip Correctness**: decode(encode(person)) = person, field for field
//! 2. **Determinism**: the same record always encodes to the same payload

#![cfg(test)]

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use super::codec::{JsonRecordCodec, RecordCodec};
use crate::domain::{Address, Person};

// =============================================================================
// Property Strategies
// =============================================================================

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1900i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn timestamp_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (0i64..4_000_000_000).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap().naive_utc())
}

/// Coordinates with four decimal places, exactly representable through JSON.
fn coordinate_strategy() -> impl Strategy<Value = f64> {
    (-1_800_000i32..1_800_000).prop_map(|v| v as f64 / 10_000.0)
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[A-Za-zÀ-ÿ0-9 .,'-]{0,40}"
}

fn address_strategy() -> impl Strategy<Value = Address> {
    (
        prop::option::of(text_strategy()),
        prop::option::of(text_strategy()),
        prop::option::of(text_strategy()),
        prop::option::of(text_strategy()),
        prop::option::of(text_strategy()),
        prop::option::of(text_strategy()),
        prop::option::of(coordinate_strategy()),
        prop::option::of(coordinate_strategy()),
    )
        .prop_map(
            |(country, city, state, district, street, address_detail, latitude, longitude)| {
                Address {
                    country,
                    city,
                    state,
                    district,
                    street,
                    address_detail,
                    latitude,
                    longitude,
                }
            },
        )
}

fn person_strategy() -> impl Strategy<Value = Person> {
    (
        any::<i64>(),
        text_strategy(),
        "[0-9]{3}\\.[0-9]{3}\\.[0-9]{3}-[0-9]{2}",
        date_strategy(),
        prop::option::of("[0-9 +()-]{8,20}"),
        prop::option::of("[a-z]{1,10}@[a-z]{1,10}\\.com"),
        prop::option::of(timestamp_strategy()),
        prop::option::of(timestamp_strategy()),
        prop::option::of(address_strategy()),
    )
        .prop_map(
            |(id, name, national_id, birth_date, phone_number, email, created_at, updated_at, address)| {
                Person {
                    id,
                    name,
                    national_id,
                    birth_date,
                    phone_number,
                    email,
                    created_at,
                    updated_at,
                    address,
                }
            },
        )
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: decoding an encoded record yields the same record.
    #[test]
    fn prop_codec_roundtrip(person in person_strategy()) {
        let codec = JsonRecordCodec::new();

        let payload = codec.encode(&person)?;
        let decoded = codec.decode(&payload)?;

        prop_assert_eq!(decoded, person);
    }

    /// Property: encoding is deterministic.
    #[test]
    fn prop_codec_deterministic(person in person_strategy()) {
        let codec = JsonRecordCodec::new();

        prop_assert_eq!(codec.encode(&person)?, codec.encode(&person)?);
    }
}

//! Property-based tests for the value codec and configuration normalizer.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p csvmorph --test property_tests
//! PROPTEST_CASES=10000 cargo test -p csvmorph --test property_tests
//! ```

use proptest::prelude::*;
use serde_json::json;

use csvmorph::{Column, CsvFormat, CsvMorphError, DataType, ValueCodec, normalize_document};

// =============================================================================
// Test Strategies
// =============================================================================

fn data_type() -> impl Strategy<Value = DataType> {
    prop::sample::select(DataType::ALL.to_vec())
}

/// Sentinel-like strings: no whitespace, possibly empty.
fn sentinel() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_\\-\\\\]{0,8}"
}

fn codec_formats(nulls_in: &str, nulls_out: &str) -> (CsvFormat, CsvFormat) {
    let input = CsvFormat {
        nulls_encoded_as: nulls_in.to_string(),
        ..CsvFormat::default()
    };
    let output = CsvFormat {
        nulls_encoded_as: nulls_out.to_string(),
        ..CsvFormat::default()
    };
    (input, output)
}

// =============================================================================
// Numeric Round-Trips
// =============================================================================

proptest! {
    #[test]
    fn integer_round_trip(n in any::<i64>()) {
        let (input, output) = codec_formats("", "");
        let codec = ValueCodec::new(&input, &output).unwrap();
        let column = Column::new("n", DataType::Integer, false);

        let text = n.to_string();
        prop_assert_eq!(codec.convert(&text, &column).unwrap(), text);
    }

    #[test]
    fn float_round_trip(x in -1.0e12f64..1.0e12f64) {
        let (input, output) = codec_formats("", "");
        let codec = ValueCodec::new(&input, &output).unwrap();
        let column = Column::new("x", DataType::Float, false);

        // Display never uses exponent notation, so it always fits the grammar
        let text = x.to_string();
        prop_assert_eq!(codec.convert(&text, &column).unwrap(), text);
    }

    #[test]
    fn integer_with_leading_zero_rejected(n in 0u32..1_000_000) {
        let (input, output) = codec_formats("", "");
        let codec = ValueCodec::new(&input, &output).unwrap();
        let column = Column::new("n", DataType::Integer, false);

        let text = format!("0{}", n);
        let is_type_error = matches!(
            codec.convert(&text, &column),
            Err(CsvMorphError::Type { .. })
        );
        prop_assert!(is_type_error);
    }
}

// =============================================================================
// Null Sentinel Handling
// =============================================================================

proptest! {
    #[test]
    fn null_on_nullable_yields_output_sentinel(
        data_type in data_type(),
        nulls_in in sentinel(),
        nulls_out in sentinel(),
    ) {
        let (input, output) = codec_formats(&nulls_in, &nulls_out);
        let codec = ValueCodec::new(&input, &output).unwrap();
        let column = Column::new("c", data_type, true);

        prop_assert_eq!(codec.convert(&nulls_in, &column).unwrap(), nulls_out);
    }

    #[test]
    fn null_on_non_nullable_always_fails(data_type in data_type(), nulls_in in sentinel()) {
        let (input, output) = codec_formats(&nulls_in, "");
        let codec = ValueCodec::new(&input, &output).unwrap();
        let column = Column::new("c", data_type, false);

        let is_not_nullable = matches!(
            codec.convert(&nulls_in, &column),
            Err(CsvMorphError::NotNullable { .. })
        );
        prop_assert!(is_not_nullable);
    }

    #[test]
    fn string_columns_accept_anything(value in "\\PC{0,40}") {
        let (input, output) = codec_formats("\u{0}", "");
        let codec = ValueCodec::new(&input, &output).unwrap();
        let column = Column::new("s", DataType::String, false);

        prop_assert_eq!(codec.convert(&value, &column).unwrap(), value);
    }
}

// =============================================================================
// Normalizer Idempotence
// =============================================================================

proptest! {
    #[test]
    fn normalizing_twice_changes_nothing(
        separator in prop::sample::select(vec![",", ";", "|", "\t"]),
        header in any::<bool>(),
        nulls in sentinel(),
        strict in any::<bool>(),
    ) {
        let mut document = json!({
            "schema": [{"column_name": "a", "data_type": "string", "nullable": true}],
            "input": {"separator": separator, "nulls_encoded_as": nulls},
            "output": {"header": header, "enclosing": {"strict": strict}}
        });

        normalize_document(&mut document).unwrap();
        let once = document.clone();
        normalize_document(&mut document).unwrap();
        prop_assert_eq!(document, once);
    }
}

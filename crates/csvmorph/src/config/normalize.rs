//! Configuration validation and defaulting.
//!
//! Validation walks the raw JSON document and collects every broken rule
//! before failing, so a user sees all problems in one pass. Defaulting then
//! fills each missing `CSVFormat` key from [`CsvFormat::default`], for the
//! input and output formats independently.

use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::Charset;
use crate::error::{CsvMorphError, Result, Violation};
use crate::schema::DataType;

use super::format::{ConfigurationFile, CsvFormat};

const ROOT_KEYS: &[&str] = &["schema", "input", "output"];

const COLUMN_KEYS: &[&str] = &["column_name", "name", "data_type", "nullable"];

const FORMAT_KEYS: &[&str] = &[
    "separator",
    "header",
    "nulls_encoded_as",
    "true_encoded_as",
    "false_encoded_as",
    "encoding",
    "enclosing",
    "escape",
    "date_format",
    "datetime_format",
];

const ENCLOSING_KEYS: &[&str] = &["characters", "strict"];

/// Accumulates violations while walking a document.
#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    fn object<'a>(&mut self, path: &str, value: &'a Value) -> Option<&'a Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.fail(path, "must be an object");
        }
        object
    }

    fn known_keys(&mut self, path: &str, object: &Map<String, Value>, allowed: &[&str]) {
        for key in object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.fail(format!("{}/{}", path, key), "is not an allowed property");
            }
        }
    }

    fn boolean(&mut self, path: &str, value: &Value) {
        if !value.is_boolean() {
            self.fail(path, "must be a boolean");
        }
    }

    fn ascii_char(&mut self, path: &str, value: &Value) {
        match value.as_str() {
            Some(s) if s.len() == 1 && s.is_ascii() => {}
            Some(_) => self.fail(path, "must be a single ASCII character"),
            None => self.fail(path, "must be a string"),
        }
    }

    /// Sentinel strings may not contain whitespace; `allow_empty` for nulls.
    fn sentinel(&mut self, path: &str, value: &Value, allow_empty: bool) {
        match value.as_str() {
            Some(s) if s.chars().any(char::is_whitespace) => {
                self.fail(path, "must not contain whitespace")
            }
            Some("") if !allow_empty => self.fail(path, "must not be empty"),
            Some(_) => {}
            None => self.fail(path, "must be a string"),
        }
    }

    fn non_empty_string(&mut self, path: &str, value: &Value) {
        match value.as_str() {
            Some("") => self.fail(path, "must not be empty"),
            Some(_) => {}
            None => self.fail(path, "must be a string"),
        }
    }

    fn column(&mut self, path: &str, value: &Value) {
        let Some(column) = self.object(path, value) else {
            return;
        };
        self.known_keys(path, column, COLUMN_KEYS);

        let name = match (column.get("column_name"), column.get("name")) {
            (Some(_), Some(_)) => {
                self.fail(path, "must not declare both 'column_name' and 'name'");
                None
            }
            (Some(name), None) => Some(("column_name", name)),
            (None, Some(name)) => Some(("name", name)),
            (None, None) => {
                self.fail(path, "must have required property 'column_name'");
                None
            }
        };
        if let Some((key, name)) = name {
            self.non_empty_string(&format!("{}/{}", path, key), name);
        }

        match column.get("data_type") {
            Some(Value::String(s)) if s.parse::<DataType>().is_ok() => {}
            Some(_) => {
                let allowed: Vec<&str> = DataType::ALL.iter().map(|t| t.as_str()).collect();
                self.fail(
                    format!("{}/data_type", path),
                    format!("must be one of: {}", allowed.join(", ")),
                );
            }
            None => self.fail(path, "must have required property 'data_type'"),
        }

        match column.get("nullable") {
            Some(nullable) => self.boolean(&format!("{}/nullable", path), nullable),
            None => self.fail(path, "must have required property 'nullable'"),
        }
    }

    fn format(&mut self, path: &str, value: &Value) {
        let Some(format) = self.object(path, value) else {
            return;
        };
        self.known_keys(path, format, FORMAT_KEYS);

        for (key, field) in format {
            let field_path = format!("{}/{}", path, key);
            match key.as_str() {
                "separator" => {
                    self.ascii_char(&field_path, field);
                    if matches!(field.as_str(), Some("\n") | Some("\r")) {
                        self.fail(field_path, "must not be a line break");
                    }
                }
                "escape" => self.ascii_char(&field_path, field),
                "header" => self.boolean(&field_path, field),
                "nulls_encoded_as" => self.sentinel(&field_path, field, true),
                "true_encoded_as" | "false_encoded_as" => {
                    self.sentinel(&field_path, field, false)
                }
                "encoding" => match field.as_str() {
                    Some(label) if Charset::for_label(label).is_some() => {}
                    Some(label) => self.fail(
                        field_path,
                        format!("unsupported charset '{}'", label),
                    ),
                    None => self.fail(field_path, "must be a string"),
                },
                "date_format" | "datetime_format" => self.non_empty_string(&field_path, field),
                "enclosing" => self.enclosing(&field_path, field),
                _ => {}
            }
        }
    }

    fn enclosing(&mut self, path: &str, value: &Value) {
        let Some(enclosing) = self.object(path, value) else {
            return;
        };
        self.known_keys(path, enclosing, ENCLOSING_KEYS);

        if let Some(characters) = enclosing.get("characters") {
            self.ascii_char(&format!("{}/characters", path), characters);
        }
        if let Some(strict) = enclosing.get("strict") {
            self.boolean(&format!("{}/strict", path), strict);
        }
    }
}

/// Check a raw configuration document, returning every violation found.
pub fn validate(document: &Value) -> Vec<Violation> {
    let mut checker = Checker::default();

    let Some(root) = checker.object("", document) else {
        return checker.violations;
    };
    checker.known_keys("", root, ROOT_KEYS);

    match root.get("schema") {
        Some(Value::Array(columns)) if columns.is_empty() => {
            checker.fail("/schema", "must contain at least one column")
        }
        Some(Value::Array(columns)) => {
            for (i, column) in columns.iter().enumerate() {
                checker.column(&format!("/schema/{}", i), column);
            }
        }
        Some(_) => checker.fail("/schema", "must be an array"),
        None => checker.fail("", "must have required property 'schema'"),
    }

    for side in ["input", "output"] {
        if let Some(format) = root.get(side) {
            checker.format(&format!("/{}", side), format);
        }
    }

    checker.violations
}

/// Recursively copy keys from `defaults` that `target` does not define.
fn fill_defaults(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match (target.get_mut(key), default) {
            (None, _) => {
                target.insert(key.clone(), default.clone());
            }
            (Some(Value::Object(inner)), Value::Object(inner_defaults)) => {
                fill_defaults(inner, inner_defaults);
            }
            _ => {}
        }
    }
}

/// Validate a document and fill unspecified format fields in place.
///
/// On failure the document is left untouched. Applying this to an already
/// complete document changes nothing.
pub fn normalize_document(document: &mut Value) -> Result<()> {
    let violations = validate(document);
    if !violations.is_empty() {
        return Err(CsvMorphError::Configuration { violations });
    }

    let defaults = match serde_json::to_value(CsvFormat::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Value::Object(root) = document {
        for side in ["input", "output"] {
            let format = root
                .entry(side)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(format) = format {
                fill_defaults(format, &defaults);
            }
        }
    }

    Ok(())
}

/// Validate and default a document, producing the typed configuration.
pub fn normalize(mut document: Value) -> Result<ConfigurationFile> {
    normalize_document(&mut document)?;
    let config: ConfigurationFile = serde_json::from_value(document)?;

    debug!(
        columns = config.schema.len(),
        input_encoding = %config.input.encoding,
        output_encoding = %config.output.encoding,
        "configuration normalized"
    );

    Ok(config)
}

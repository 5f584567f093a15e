//! Declarative shape checks over [`serde_json::Value`].
//!
//! Serde stops at the first mismatch, but a rejected request should tell the
//! client about every bad field at once. The shapes here are checked by hand
//! and each problem is recorded with the path that leads to it.

use std::fmt;

use serde_json::{Map, Value};

/// Expected type of a single field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    /// Any JSON string.
    String,
    /// A whole number within an inclusive range.
    Integer {
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// An array whose elements are all strings.
    StringArray,
    /// A nested object. Keys not listed are accepted as-is.
    Object(&'static [Field]),
    /// Exactly this string.
    Literal(&'static str),
}

/// A named field of an object shape.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Key in the JSON object.
    pub name: &'static str,
    /// Expected type of the value.
    pub ty: FieldType,
    /// Whether the key must be present.
    pub required: bool,
}

impl Field {
    /// A field that must be present.
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    /// A field that is checked only when present.
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// One member of a tagged union.
#[derive(Debug, Clone, Copy)]
pub struct Variant {
    /// Literal value of the discriminant.
    pub tag: &'static str,
    /// Fields other than the discriminant.
    pub fields: &'static [Field],
}

/// A closed set of object shapes told apart by one string field.
#[derive(Debug, Clone, Copy)]
pub struct TaggedUnion {
    /// Name of the discriminant field.
    pub tag_field: &'static str,
    /// Every accepted variant.
    pub variants: &'static [Variant],
}

/// A step in the path from the checked value to a problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array position.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A single mismatch between a value and its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Where the mismatch is. Empty for the checked value itself.
    pub path: Vec<PathSegment>,
    /// What is wrong.
    pub message: String,
}

impl Issue {
    /// Dotted form of the path, e.g. `config.guild`.
    pub fn dotted_path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Every mismatch found while checking one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaIssues(Vec<Issue>);

impl SchemaIssues {
    /// A single problem with the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self(vec![Issue {
            path: Vec::new(),
            message: message.into(),
        }])
    }

    /// The recorded issues, in the order they were found.
    pub fn issues(&self) -> &[Issue] {
        &self.0
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, path: &[PathSegment], message: impl Into<String>) {
        self.0.push(Issue {
            path: path.to_vec(),
            message: message.into(),
        });
    }

    /// Render the issues as a tree mirroring the value.
    ///
    /// Every node carries an `_errors` array and one child per path segment
    /// below it, so `{"id": 1}` checked against a string `id` becomes
    /// `{"_errors":[],"id":{"_errors":["Expected string, received number"]}}`.
    pub fn format(&self) -> Value {
        let mut root = empty_node();
        for issue in &self.0 {
            insert_formatted(&mut root, &issue.path, &issue.message);
        }
        Value::Object(root)
    }
}

impl fmt::Display for SchemaIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

fn insert_formatted(node: &mut Map<String, Value>, path: &[PathSegment], message: &str) {
    match path.split_first() {
        None => {
            if let Some(Value::Array(errors)) = node.get_mut("_errors") {
                errors.push(Value::String(message.to_owned()));
            }
        }
        Some((head, rest)) => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(empty_node()));
            if let Value::Object(child) = child {
                insert_formatted(child, rest, message);
            }
        }
    }
}

fn empty_node() -> Map<String, Value> {
    let mut node = Map::new();
    node.insert("_errors".to_owned(), Value::Array(Vec::new()));
    node
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl TaggedUnion {
    /// Find the variant `value` claims to be and check it against that shape.
    pub fn check(&self, value: &Value) -> Result<&Variant, SchemaIssues> {
        let mut issues = SchemaIssues::default();
        let Value::Object(object) = value else {
            issues.push(&[], format!("Expected object, received {}", type_name(value)));
            return Err(issues);
        };

        let path = [PathSegment::Key(self.tag_field.to_owned())];
        let tag = match object.get(self.tag_field) {
            None => {
                issues.push(&path, "Required");
                return Err(issues);
            }
            Some(Value::String(tag)) => tag,
            Some(other) => {
                issues.push(
                    &path,
                    format!("Expected string, received {}", type_name(other)),
                );
                return Err(issues);
            }
        };

        let Some(variant) = self.variants.iter().find(|v| v.tag == tag) else {
            let expected = self
                .variants
                .iter()
                .map(|v| format!("'{}'", v.tag))
                .collect::<Vec<_>>()
                .join(" | ");
            issues.push(
                &path,
                format!("Invalid discriminator value. Expected {expected}"),
            );
            return Err(issues);
        };

        check_fields(object, variant.fields, &mut Vec::new(), &mut issues);
        if issues.is_empty() {
            Ok(variant)
        } else {
            Err(issues)
        }
    }
}

impl Variant {
    /// Check `value` against this variant only, discriminant included.
    pub fn check(&self, tag_field: &'static str, value: &Value) -> Result<(), SchemaIssues> {
        let mut issues = SchemaIssues::default();
        let Value::Object(object) = value else {
            issues.push(&[], format!("Expected object, received {}", type_name(value)));
            return Err(issues);
        };
        let tag = [Field::required(tag_field, FieldType::Literal(self.tag))];
        check_fields(object, &tag, &mut Vec::new(), &mut issues);
        check_fields(object, self.fields, &mut Vec::new(), &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn check_fields(
    object: &Map<String, Value>,
    fields: &[Field],
    path: &mut Vec<PathSegment>,
    issues: &mut SchemaIssues,
) {
    for field in fields {
        path.push(PathSegment::Key(field.name.to_owned()));
        match object.get(field.name) {
            Some(value) => check_value(value, field.ty, path, issues),
            None if field.required => issues.push(path, "Required"),
            None => {}
        }
        path.pop();
    }
}

fn check_value(
    value: &Value,
    ty: FieldType,
    path: &mut Vec<PathSegment>,
    issues: &mut SchemaIssues,
) {
    match (ty, value) {
        (FieldType::String, Value::String(_)) => {}
        (FieldType::String, other) => issues.push(
            path,
            format!("Expected string, received {}", type_name(other)),
        ),
        (FieldType::Integer { min, max }, Value::Number(number)) => match number.as_i64() {
            Some(n) if n < min => issues.push(
                path,
                format!("Number must be greater than or equal to {min}"),
            ),
            Some(n) if n > max => {
                issues.push(path, format!("Number must be less than or equal to {max}"))
            }
            Some(_) => {}
            None if number.is_u64() => {
                issues.push(path, format!("Number must be less than or equal to {max}"))
            }
            None => issues.push(path, "Expected integer, received float"),
        },
        (FieldType::Integer { .. }, other) => issues.push(
            path,
            format!("Expected number, received {}", type_name(other)),
        ),
        (FieldType::StringArray, Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                check_value(item, FieldType::String, path, issues);
                path.pop();
            }
        }
        (FieldType::StringArray, other) => issues.push(
            path,
            format!("Expected array, received {}", type_name(other)),
        ),
        (FieldType::Object(fields), Value::Object(object)) => {
            check_fields(object, fields, path, issues)
        }
        (FieldType::Object(_), other) => issues.push(
            path,
            format!("Expected object, received {}", type_name(other)),
        ),
        (FieldType::Literal(expected), Value::String(actual)) if actual == expected => {}
        (FieldType::Literal(expected), _) => {
            issues.push(path, format!("Invalid literal value, expected \"{expected}\""))
        }
    }
}

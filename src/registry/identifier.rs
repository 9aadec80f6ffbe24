use std::fmt;

use crate::generate::error::{GenerateError, GenerateResult};

pub const DEFAULT_SEPARATOR: &str = ":";

/// Type of one identifier field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
}

impl IdField {
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::String,
            optional: false,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Int,
            optional: false,
        }
    }

    /// Field that may be left out of the encoded identifier
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// One decoded identifier field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdPart {
    Int(i64),
    String(String),
}

impl fmt::Display for IdPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPart::Int(i) => write!(f, "{}", i),
            IdPart::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for IdPart {
    fn from(value: i64) -> Self {
        IdPart::Int(value)
    }
}

impl From<&str> for IdPart {
    fn from(value: &str) -> Self {
        IdPart::String(value.to_string())
    }
}

impl From<String> for IdPart {
    fn from(value: String) -> Self {
        IdPart::String(value)
    }
}

/// Identifier codec of one resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFormat {
    separators: Vec<&'static str>,
    fields: Vec<IdField>,
}

impl IdFormat {
    pub fn new(fields: Vec<IdField>) -> Self {
        Self {
            separators: vec![DEFAULT_SEPARATOR],
            fields,
        }
    }

    /// Also accept `legacy` when decoding; encoding always uses the default
    pub fn with_legacy_separator(mut self, legacy: &'static str) -> Self {
        self.separators.push(legacy);
        self
    }

    pub fn fields(&self) -> &[IdField] {
        &self.fields
    }

    fn required_fields(&self) -> Vec<&IdField> {
        self.fields.iter().filter(|f| !f.optional).collect()
    }

    /// Encode parts. Accepts either every field or only the required ones.
    pub fn make(&self, parts: &[IdPart]) -> GenerateResult<String> {
        let expected: Vec<&IdField> = if parts.len() == self.fields.len() {
            self.fields.iter().collect()
        } else if parts.len() == self.required_fields().len() {
            self.required_fields()
        } else {
            return Err(GenerateError::InvalidIdentifier(format!(
                "expected {} fields, got {}",
                self.fields.len(),
                parts.len()
            )));
        };

        for (field, part) in expected.iter().zip(parts) {
            let matches = matches!(
                (field.kind, part),
                (FieldKind::Int, IdPart::Int(_)) | (FieldKind::String, IdPart::String(_))
            );
            if !matches {
                return Err(GenerateError::InvalidIdentifier(format!(
                    "unexpected value {:?} for field {:?}",
                    part, field.name
                )));
            }
        }

        Ok(parts
            .iter()
            .map(IdPart::to_string)
            .collect::<Vec<_>>()
            .join(DEFAULT_SEPARATOR))
    }

    /// Decode an identifier, trying the full arity first and then the
    /// required-only arity, for each accepted separator
    pub fn split(&self, id: &str) -> GenerateResult<Vec<IdPart>> {
        let all: Vec<&IdField> = self.fields.iter().collect();
        let required = self.required_fields();

        for separator in &self.separators {
            let pieces: Vec<&str> = id.split(separator).collect();

            for expected in [&all, &required] {
                if pieces.len() == expected.len() {
                    return pieces
                        .iter()
                        .zip(expected.iter())
                        .map(|(piece, field)| parse_part(piece, field))
                        .collect();
                }
            }
        }

        let names: Vec<&str> = self.fields.iter().map(|f| f.name).collect();
        Err(GenerateError::InvalidIdentifier(format!(
            "id {:?} does not match expected format. Should be in the format: {}",
            id,
            names.join(DEFAULT_SEPARATOR)
        )))
    }
}

fn parse_part(piece: &str, field: &IdField) -> GenerateResult<IdPart> {
    match field.kind {
        FieldKind::String => Ok(IdPart::String(piece.to_string())),
        FieldKind::Int => piece.parse::<i64>().map(IdPart::Int).map_err(|_| {
            GenerateError::InvalidIdentifier(format!(
                "expected int for field {:?}, got {:?}",
                field.name, piece
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_scoped() -> IdFormat {
        IdFormat::new(vec![IdField::int("orgID").optional(), IdField::string("uid")])
    }

    #[test]
    fn test_round_trip() {
        let format = IdFormat::new(vec![
            IdField::string("region"),
            IdField::string("policyId"),
        ]);
        let parts = vec![IdPart::from("eu"), IdPart::from("a1b2")];

        let id = format.make(&parts).unwrap();
        assert_eq!(id, "eu:a1b2");
        assert_eq!(format.split(&id).unwrap(), parts);
    }

    #[test]
    fn test_optional_field_falls_back_to_required_arity() {
        let format = org_scoped();

        assert_eq!(
            format.split("2:abc").unwrap(),
            vec![IdPart::Int(2), IdPart::from("abc")]
        );
        assert_eq!(format.split("abc").unwrap(), vec![IdPart::from("abc")]);
        assert_eq!(format.make(&[IdPart::from("abc")]).unwrap(), "abc");
    }

    #[test]
    fn test_legacy_separator() {
        let format = IdFormat::new(vec![IdField::string("region"), IdField::string("id")])
            .with_legacy_separator("/");

        assert_eq!(
            format.split("us/xyz").unwrap(),
            vec![IdPart::from("us"), IdPart::from("xyz")]
        );
        assert_eq!(
            format.make(&[IdPart::from("us"), IdPart::from("xyz")]).unwrap(),
            "us:xyz"
        );
    }

    #[test]
    fn test_wrong_arity_is_typed_error() {
        let format = IdFormat::new(vec![IdField::string("a"), IdField::string("b")]);
        let err = format.split("x:y:z").unwrap_err();

        assert!(matches!(err, GenerateError::InvalidIdentifier(_)));
        assert_eq!(
            err.to_string(),
            "id \"x:y:z\" does not match expected format. Should be in the format: a:b"
        );
    }

    #[test]
    fn test_int_field_validation() {
        let format = org_scoped();

        assert!(format.split("one:abc").is_err());
        assert!(format.make(&[IdPart::from("1"), IdPart::from("abc")]).is_err());
    }
}

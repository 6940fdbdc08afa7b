//! Raw input records and the schemas that bind them to concrete types.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::io;
use std::sync::OnceLock;

/// A single observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

/// A record field that may or may not have been observed.
///
/// `Absent` is distinct from `Present(Number(0.0))` and `Present(Text(""))`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field {
    Present(Scalar),
    #[default]
    Absent,
}

impl Field {
    pub fn number(value: f64) -> Self {
        Field::Present(Scalar::Number(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Field::Present(Scalar::Text(value.into()))
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }
}

impl From<Option<f64>> for Field {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Field::Absent, Field::number)
    }
}

impl From<Option<String>> for Field {
    fn from(value: Option<String>) -> Self {
        value.map_or(Field::Absent, Field::text)
    }
}

/// Mapping from field name to optional scalar.
///
/// A name missing from the map is not part of the record's schema;
/// a name mapped to [`Field::Absent`] is part of it but unobserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    fields: BTreeMap<String, Field>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.insert(name, field);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        self.fields.insert(name.into(), field.into());
    }

    /// `None` when the schema has no such field.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Field)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (N, Field)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(n, f)| (n.into(), f)).collect(),
        }
    }
}

/// Declared type of a schema column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered named-field declaration shared by every record of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    fields: Vec<FieldDef>,
}

impl RecordSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reader over headerless comma-separated rows, columns trimmed.
    ///
    /// Rows of any width are passed through so that [`bind_row`](Self::bind_row)
    /// reports arity against the schema.
    pub fn csv_reader<R: io::Read>(input: R) -> csv::Reader<R> {
        ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input)
    }

    /// Bind one CSV row whose columns follow the schema order.
    ///
    /// An empty column is `Absent`; text columns are taken as unquoted.
    pub fn bind_row(&self, row: &StringRecord) -> Result<RawRecord> {
        if row.len() != self.fields.len() {
            return Err(PipelineError::InvalidRecord(format!(
                "expected {} columns, got {}",
                self.fields.len(),
                row.len()
            )));
        }

        let mut record = RawRecord::new();
        for (def, column) in self.fields.iter().zip(row.iter()) {
            let field = if column.is_empty() {
                Field::Absent
            } else {
                match def.kind {
                    FieldKind::Numeric => {
                        let value = column.parse::<f64>().map_err(|e| {
                            PipelineError::InvalidRecord(format!(
                                "field '{}': '{}' is not numeric ({})",
                                def.name, column, e
                            ))
                        })?;
                        Field::number(value)
                    }
                    FieldKind::Text => Field::text(column),
                }
            };
            record.insert(def.name.clone(), field);
        }
        Ok(record)
    }

    /// Parse a single CSV line. A blank line binds as a zero-column row.
    pub fn parse_csv_line(&self, line: &str) -> Result<RawRecord> {
        let row = match Self::csv_reader(line.as_bytes()).records().next() {
            Some(row) => row?,
            None => StringRecord::new(),
        };
        self.bind_row(&row)
    }
}

/// A concrete record type bound to a schema.
pub trait Record {
    fn schema() -> &'static RecordSchema;

    fn into_raw(self) -> RawRecord;
}

/// The iris measurement record.
///
/// Column order: petal length, petal width, sepal length, sepal width, class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iris {
    pub petal_length: Option<f64>,
    pub petal_width: Option<f64>,
    pub sepal_length: Option<f64>,
    pub sepal_width: Option<f64>,
    pub class_name: Option<String>,
}

impl Record for Iris {
    fn schema() -> &'static RecordSchema {
        static SCHEMA: OnceLock<RecordSchema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            let numeric = |name: &str| FieldDef {
                name: name.to_string(),
                kind: FieldKind::Numeric,
            };
            RecordSchema::new(vec![
                numeric("petal_length"),
                numeric("petal_width"),
                numeric("sepal_length"),
                numeric("sepal_width"),
                FieldDef {
                    name: "class_name".to_string(),
                    kind: FieldKind::Text,
                },
            ])
        })
    }

    fn into_raw(self) -> RawRecord {
        RawRecord::new()
            .with("petal_length", self.petal_length)
            .with("petal_width", self.petal_width)
            .with("sepal_length", self.sepal_length)
            .with("sepal_width", self.sepal_width)
            .with("class_name", self.class_name)
    }
}

impl Iris {
    /// Class labels in class-index order
    pub const CLASSES: [&'static str; 3] = ["Iris-setosa", "Iris-versicolor", "Iris-virginica"];

    pub fn class_index(label: &str) -> Option<usize> {
        Self::CLASSES.iter().position(|c| *c == label)
    }

    /// Class index of a raw iris record's label, if it has a known one.
    pub fn label_of(record: &RawRecord) -> Option<usize> {
        match record.get("class_name") {
            Some(Field::Present(Scalar::Text(label))) => Self::class_index(label),
            _ => None,
        }
    }
}

use crate::models::Field;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Error reading file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Required columns missing: {}", join_fields(.missing))]
    Schema { missing: Vec<Field> },

    #[error("Columns {first:?} and {second:?} both map to {field}")]
    HeaderCollision {
        field: Field,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("{0} data not found in the uploaded file")]
    MissingDimension(Field),
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

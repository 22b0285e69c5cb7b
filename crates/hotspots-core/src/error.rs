use thiserror::Error;

/// Errors raised while decoding a single message off the log.
///
/// These are always recoverable at the message level: the caller drops the
/// offending message and continues with the next one.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message is missing the schema_name header")]
    NoSchemaNameHeader,

    #[error("unrecognized schema name: {0}")]
    UnrecognizedSchema(String),

    #[error("failed to decode avro payload for schema {schema}: {source}")]
    Avro {
        schema: &'static str,
        #[source]
        source: apache_avro::Error,
    },
}

/// Errors raised while parsing aggregates request parameters.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("unrecognized time precision {0:?}")]
    InvalidTimePrecision(String),

    #[error("geo precision {0} out of range [1,7]")]
    InvalidGeoPrecision(i64),

    #[error("geo precision {0:?} is not a number")]
    GeoPrecisionNotANumber(String),
}

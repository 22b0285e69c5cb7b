use crate::error::DecodeError;
use crate::records::{Record, SCHEMA_NAME_HEADER};

/// A single log message as delivered by the message-log client: headers
/// plus an opaque payload.
pub struct RawMessage<'a> {
    pub headers: &'a [(&'a str, &'a [u8])],
    pub payload: &'a [u8],
}

/// Linear search for the `schema_name` header.
pub fn get_schema_name<'a>(headers: &[(&'a str, &'a [u8])]) -> Result<&'a str, DecodeError> {
    headers
        .iter()
        .find(|(key, _)| *key == SCHEMA_NAME_HEADER)
        .map(|(_, value)| std::str::from_utf8(value).unwrap_or(""))
        .filter(|name| !name.is_empty())
        .ok_or(DecodeError::NoSchemaNameHeader)
}

/// Resolve a message's schema header and decode its payload into a
/// concrete record.
pub fn decode_message(message: &RawMessage<'_>) -> Result<Record, DecodeError> {
    let schema_name = get_schema_name(message.headers)?;
    Record::decode(schema_name, message.payload)
}

/// Decode a batch of raw messages, silently dropping any message whose
/// header is missing or whose payload fails to decode.
pub fn decode_messages<'a, I>(messages: I) -> impl Iterator<Item = Record> + 'a
where
    I: IntoIterator<Item = RawMessage<'a>> + 'a,
{
    messages.into_iter().filter_map(|message| match decode_message(&message) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::debug!(error = %err, "dropping undecodable message");
            None
        }
    })
}

//! Request validation at the service boundary

use crate::authz::AuthzError;
use crate::types::{Collection, Operation, Record};

/// Longest accepted identifier
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Check an opaque identifier: 1-64 chars of `[A-Za-z0-9_-]`
pub fn validate_identifier(value: &str, field: &'static str) -> Result<(), AuthzError> {
    if value.is_empty() {
        return Err(AuthzError::InvalidIdentifier {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(AuthzError::InvalidIdentifier {
            field,
            reason: "longer than 64 characters",
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AuthzError::InvalidIdentifier {
            field,
            reason: "only letters, digits, '_' and '-' are allowed",
        });
    }
    Ok(())
}

/// Fields a new record of `collection` must carry
const fn required_on_create(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Notifications => &["created_by", "recipient"],
        _ => &["created_by"],
    }
}

/// Reject malformed input before it reaches the evaluator
///
/// Creates must name their creator (and a notification its recipient);
/// a missing field is a bad request, never a denial.
pub fn validate_request(operation: Operation, record: &Record) -> Result<(), AuthzError> {
    validate_identifier(record.id.as_str(), "record id")?;
    if let Some(creator) = &record.created_by {
        validate_identifier(creator.as_str(), "created_by")?;
    }
    if let Some(recipient) = &record.recipient {
        validate_identifier(recipient.as_str(), "recipient")?;
    }

    if operation != Operation::Create {
        return Ok(());
    }
    for &field in required_on_create(record.collection) {
        let present = match field {
            "created_by" => record.created_by.is_some(),
            "recipient" => record.recipient.is_some(),
            _ => true,
        };
        if !present {
            return Err(AuthzError::MissingField {
                collection: record.collection,
                field,
            });
        }
    }
    Ok(())
}

//! Shape checks for broadcast-comment requests. Runs before any network
//! call; a request that passes is classified as either a post or a reply.

use serde::Serialize;

use crate::request::{BeneficiaryShare, BroadcastCommentRequest, SigningKey};

/// Largest share a single beneficiary may request.
pub const MAX_BENEFICIARY_PERCENT: u16 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedRequest<'a> {
    Post {
        title: &'a str,
        tags: &'a [String],
        permlink: Option<&'a str>,
        beneficiaries: Option<&'a [BeneficiaryShare]>,
    },
    Comment {
        parent_author: &'a str,
        parent_permlink: &'a str,
        beneficiaries: Option<&'a [BeneficiaryShare]>,
    },
}

/// Returns every problem found in `request`; empty means valid.
pub fn validate_broadcast_comment(request: &BroadcastCommentRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    require_non_empty(&mut errors, "author", Some(request.author.as_str()));
    if request.signing_key.is_empty() {
        errors.push(FieldError::new("wif", "\"wif\" is required and cannot be empty"));
    }
    require_non_empty(&mut errors, "body", Some(request.body.as_str()));

    let options = &request.options;
    optional_non_empty(&mut errors, "app", options.publish.app.as_deref());
    optional_non_empty(&mut errors, "format", options.publish.format.as_deref());

    for (index, share) in options.beneficiaries.iter().flatten().enumerate() {
        if share.percent > MAX_BENEFICIARY_PERCENT {
            errors.push(FieldError::new(
                format!("beneficiaries[{index}]"),
                format!("\"beneficiaries[{index}].percent\" must not exceed {MAX_BENEFICIARY_PERCENT}"),
            ));
        }
    }

    if options.is_reply() {
        require_non_empty(&mut errors, "parent_permlink", options.parent_permlink.as_deref());
    } else {
        require_non_empty(&mut errors, "title", options.title.as_deref());
        optional_non_empty(&mut errors, "permlink", options.permlink.as_deref());
        match options.tags.as_deref() {
            None => errors.push(FieldError::new("tags", "\"tags\" are required")),
            Some([]) => errors.push(FieldError::new("tags", "\"tags\" must contain at least one item")),
            Some(tags) => {
                for (index, tag) in tags.iter().enumerate() {
                    if tag.is_empty() {
                        errors.push(FieldError::new(
                            format!("tags[{index}]"),
                            format!("\"tags[{index}]\" cannot be empty"),
                        ));
                    }
                }
            }
        }
    }

    errors
}

/// Checks the arguments of a plain publish call.
pub fn validate_publish(author: &str, signing_key: &SigningKey, title: &str, body: &str, tags: &[String]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require_non_empty(&mut errors, "author", Some(author));
    if signing_key.is_empty() {
        errors.push(FieldError::new("wif", "\"wif\" is required and cannot be empty"));
    }
    require_non_empty(&mut errors, "title", Some(title));
    require_non_empty(&mut errors, "body", Some(body));
    if tags.first().map_or(true, |tag| tag.is_empty()) {
        errors.push(FieldError::new("tags", "\"tags\" must start with a non-empty tag"));
    }
    errors
}

/// Validates and classifies `request` in one step.
pub fn classify(request: &BroadcastCommentRequest) -> Result<ValidatedRequest<'_>, Vec<FieldError>> {
    let errors = validate_broadcast_comment(request);
    if !errors.is_empty() {
        return Err(errors);
    }

    let options = &request.options;
    let beneficiaries = options.beneficiaries.as_deref();
    // Both branches only read fields the validator proved present.
    let classified = match (&options.parent_author, &options.parent_permlink) {
        (Some(parent_author), Some(parent_permlink)) if options.is_reply() => ValidatedRequest::Comment {
            parent_author: parent_author.as_str(),
            parent_permlink: parent_permlink.as_str(),
            beneficiaries,
        },
        _ => ValidatedRequest::Post {
            title: options.title.as_deref().unwrap_or_default(),
            tags: options.tags.as_deref().unwrap_or_default(),
            permlink: options.permlink.as_deref(),
            beneficiaries,
        },
    };
    Ok(classified)
}

fn require_non_empty(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) {
    match value {
        None => errors.push(FieldError::new(field, format!("\"{field}\" is required"))),
        Some("") => errors.push(FieldError::new(field, format!("\"{field}\" cannot be empty"))),
        Some(_) => {}
    }
}

fn optional_non_empty(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) {
    if value == Some("") {
        errors.push(FieldError::new(field, format!("\"{field}\" cannot be empty")));
    }
}

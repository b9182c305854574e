use outreach_core::{clean_text, extract_contact_info, ContactRecord};
use thiserror::Error;

use crate::source::RawProfile;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// Name or company missing; the record would be impossible to
    /// deduplicate, so it is dropped with a diagnostic.
    #[error("profile {user_id:?} has no usable identity")]
    MissingIdentity { user_id: String },
}

/// Turns a raw listing entry into a store-ready [`ContactRecord`].
///
/// All fields are whitespace-cleaned; email, phone and social handles
/// are mined out of the introduction text.
pub fn extract_record(raw: &RawProfile) -> Result<ContactRecord, ExtractionError> {
    let full_name = clean_text(&format!("{} {}", raw.first_name, raw.last_name));
    let company_name = clean_text(&raw.company_name);
    if full_name.is_empty() || company_name.is_empty() {
        return Err(ExtractionError::MissingIdentity {
            user_id: raw.user_id.clone(),
        });
    }

    let introduction = clean_text(&raw.introduction);
    let info = extract_contact_info(&introduction);

    Ok(ContactRecord {
        full_name,
        company_name,
        position: clean_text(&raw.job_title),
        linkedin_url: clean_text(&raw.linkedin_url),
        facebook_url: clean_text(&raw.facebook_url),
        x_twitter_url: clean_text(&raw.twitter_url),
        other_socials: String::new(),
        country: clean_text(&raw.country),
        responsibility: clean_text(&raw.responsibility),
        gaming_vertical: clean_text(&raw.gaming_vertical),
        organization_type: clean_text(&raw.organization_type),
        introduction,
        email: info.emails.first().cloned().unwrap_or_default(),
        phone: info.phones.first().cloned().unwrap_or_default(),
        social_handles: info.handles.join("; "),
        source_url: clean_text(&raw.profile_url),
        profile_image_url: clean_text(&raw.photo_url),
        user_id: clean_text(&raw.user_id),
    })
}

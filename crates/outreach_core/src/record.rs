/// One person in the contact store. All fields are plain text; empty
/// means "not known". `user_id` is the platform-side identifier used
/// when messaging the contact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactRecord {
    pub full_name: String,
    pub company_name: String,
    pub position: String,
    pub linkedin_url: String,
    pub facebook_url: String,
    pub x_twitter_url: String,
    pub other_socials: String,
    pub country: String,
    pub responsibility: String,
    pub gaming_vertical: String,
    pub organization_type: String,
    pub introduction: String,
    pub email: String,
    pub phone: String,
    pub social_handles: String,
    pub source_url: String,
    pub profile_image_url: String,
    pub user_id: String,
}

impl ContactRecord {
    /// The dedup key for this record: `name|company`, case-insensitive.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.full_name, &self.company_name)
    }

    /// True when both identity fields are present. Records failing this
    /// cannot be deduplicated and are rejected at extraction time.
    pub fn has_identity(&self) -> bool {
        !self.full_name.trim().is_empty() && !self.company_name.trim().is_empty()
    }

    /// First word of the full name, for message personalization.
    /// Empty names yield `None`; callers fall back to a generic greeting.
    pub fn first_name(&self) -> Option<&str> {
        self.full_name.split_whitespace().next()
    }

    /// Merges `incoming` into `self`: a non-empty incoming field wins
    /// over whatever is stored. Returns true when any field changed.
    pub fn absorb(&mut self, incoming: &ContactRecord) -> bool {
        let mut changed = false;
        changed |= fill_identity(&mut self.full_name, &incoming.full_name);
        changed |= fill_identity(&mut self.company_name, &incoming.company_name);
        changed |= fill(&mut self.position, &incoming.position);
        changed |= fill(&mut self.linkedin_url, &incoming.linkedin_url);
        changed |= fill(&mut self.facebook_url, &incoming.facebook_url);
        changed |= fill(&mut self.x_twitter_url, &incoming.x_twitter_url);
        changed |= fill(&mut self.other_socials, &incoming.other_socials);
        changed |= fill(&mut self.country, &incoming.country);
        changed |= fill(&mut self.responsibility, &incoming.responsibility);
        changed |= fill(&mut self.gaming_vertical, &incoming.gaming_vertical);
        changed |= fill(&mut self.organization_type, &incoming.organization_type);
        changed |= fill(&mut self.introduction, &incoming.introduction);
        changed |= fill(&mut self.email, &incoming.email);
        changed |= fill(&mut self.phone, &incoming.phone);
        changed |= fill(&mut self.social_handles, &incoming.social_handles);
        changed |= fill(&mut self.source_url, &incoming.source_url);
        changed |= fill(&mut self.profile_image_url, &incoming.profile_image_url);
        changed |= fill(&mut self.user_id, &incoming.user_id);
        changed
    }
}

fn fill(slot: &mut String, incoming: &str) -> bool {
    if incoming.is_empty() || slot == incoming {
        return false;
    }
    *slot = incoming.to_owned();
    true
}

/// Like [`fill`], but a respelling of the same identity (case or
/// whitespace variation) keeps the stored form. An unchanged feed must
/// not dirty the store on every run.
fn fill_identity(slot: &mut String, incoming: &str) -> bool {
    if incoming.is_empty()
        || normalize_identity_part(slot.as_str()) == normalize_identity_part(incoming)
    {
        return false;
    }
    *slot = incoming.to_owned();
    true
}

/// Case- and whitespace-insensitive identity of a contact.
///
/// Two records with the same key are the same person at the same
/// company, regardless of how the listing rendered them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(full_name: &str, company_name: &str) -> Self {
        IdentityKey(format!(
            "{}|{}",
            normalize_identity_part(full_name),
            normalize_identity_part(company_name)
        ))
    }

    /// Rebuilds a key from its stored string form.
    pub fn from_raw(raw: &str) -> Self {
        IdentityKey(raw.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercases and collapses internal whitespace to single spaces.
pub fn normalize_identity_part(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Collapses all whitespace runs (including newlines and tabs) to a
/// single space and trims the ends. Applied to every extracted field so
/// the store stays one-line-per-record.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// What a store merge did with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A record with a new identity key was added.
    Inserted,
    /// An existing record gained at least one field.
    Updated,
    /// The identity was already stored and nothing new was learned.
    Duplicate,
}

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s().\-]{5,18}\d").unwrap());

static TELEGRAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:t\.me|telegram\.me)/([A-Za-z0-9_]{3,32})").unwrap()
});

static WHATSAPP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)wa\.me/(\+?\d{6,15})").unwrap());

static LINKEDIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)linkedin\.com/in/([A-Za-z0-9\-_%]+)").unwrap()
});

static TWITTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:twitter|x)\.com/([A-Za-z0-9_]{1,15})").unwrap()
});

// The regex crate has no lookbehind, so the leading context is a capture
// group: a bare @handle must not be preceded by an email-local character.
static BARE_HANDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9._%+-])@([A-Za-z0-9_]{3,31})\b").unwrap()
});

/// Contact details mined from a free-text introduction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactInfo {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub handles: Vec<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty() && self.handles.is_empty()
    }
}

/// Scans `text` for email addresses, phone numbers and social handles.
///
/// Results keep first-seen order with duplicates removed. Phone
/// candidates must carry 7 to 15 digits; shorter or longer runs are
/// discarded as ids or timestamps.
pub fn extract_contact_info(text: &str) -> ContactInfo {
    let mut info = ContactInfo::default();

    for m in EMAIL.find_iter(text) {
        push_unique(&mut info.emails, m.as_str().to_owned());
    }

    // Blank out emails before the phone scan so their digit runs are
    // not picked up as numbers.
    let without_emails = EMAIL.replace_all(text, " ");
    for m in PHONE.find_iter(&without_emails) {
        let digits = m.as_str().chars().filter(|c| c.is_ascii_digit()).count();
        if (7..=15).contains(&digits) {
            push_unique(&mut info.phones, clean_phone(m.as_str()));
        }
    }

    for caps in TELEGRAM.captures_iter(text) {
        push_unique(&mut info.handles, format!("telegram:@{}", &caps[1]));
    }
    for caps in WHATSAPP.captures_iter(text) {
        push_unique(&mut info.handles, format!("whatsapp:{}", &caps[1]));
    }
    for caps in LINKEDIN.captures_iter(text) {
        push_unique(&mut info.handles, format!("linkedin:{}", &caps[1]));
    }
    for caps in TWITTER.captures_iter(text) {
        push_unique(&mut info.handles, format!("x:@{}", &caps[1]));
    }
    for caps in BARE_HANDLE.captures_iter(text) {
        push_unique(&mut info.handles, format!("@{}", &caps[1]));
    }

    info
}

fn clean_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.iter().any(|existing| *existing == value) {
        list.push(value);
    }
}

use crate::record::ContactRecord;

/// One identity's slice of the workload, in whole percent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSpec {
    pub identity: String,
    pub share: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributeError {
    /// The configured shares do not sum to exactly 100.
    SharesDoNotSum { total: u32 },
    /// No identities were configured.
    NoIdentities,
}

impl std::fmt::Display for DistributeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributeError::SharesDoNotSum { total } => {
                write!(f, "identity shares sum to {total}, expected 100")
            }
            DistributeError::NoIdentities => f.write_str("no identities configured"),
        }
    }
}

impl std::error::Error for DistributeError {}

/// The contacts assigned to one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub identity: String,
    pub contacts: Vec<ContactRecord>,
}

/// Splits `contacts` across identities by their percentage shares.
///
/// Boundaries are cumulative floors of `share * len / 100`, so the
/// split is deterministic and order-preserving; the last identity
/// absorbs the rounding remainder. Shares must sum to exactly 100.
pub fn distribute_contacts(
    contacts: Vec<ContactRecord>,
    shares: &[ShareSpec],
) -> Result<Vec<Partition>, DistributeError> {
    if shares.is_empty() {
        return Err(DistributeError::NoIdentities);
    }
    let total: u32 = shares.iter().map(|s| u32::from(s.share)).sum();
    if total != 100 {
        return Err(DistributeError::SharesDoNotSum { total });
    }

    let len = contacts.len();
    let mut partitions = Vec::with_capacity(shares.len());
    let mut cumulative: u32 = 0;
    let mut start = 0usize;
    let mut remaining = contacts;

    for (index, spec) in shares.iter().enumerate() {
        cumulative += u32::from(spec.share);
        let end = if index + 1 == shares.len() {
            len
        } else {
            (cumulative as usize * len) / 100
        };
        let take = end.saturating_sub(start);
        let rest = remaining.split_off(take.min(remaining.len()));
        partitions.push(Partition {
            identity: spec.identity.clone(),
            contacts: remaining,
        });
        remaining = rest;
        start = end;
    }

    Ok(partitions)
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and timestamp recorded on a commit as author or committer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

impl Signature {
    /// Signature with an explicit timestamp.
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Signature stamped with the current time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Utc::now())
    }

    /// Same identity, fresh timestamp.
    pub fn restamped(&self) -> Self {
        Self::now(self.name.clone(), self.email.clone())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.when.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn display_includes_identity_and_time() {
        let when = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let sig = Signature::new("Ada", "ada@example.com", when);
        assert_eq!(sig.to_string(), "Ada <ada@example.com> 2024-01-02T03:04:05+00:00");
    }

    #[test]
    fn restamped_keeps_identity() {
        let when = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let sig = Signature::new("Ada", "ada@example.com", when);
        let fresh = sig.restamped();
        assert_eq!(fresh.name, sig.name);
        assert_eq!(fresh.email, sig.email);
        assert!(fresh.when > sig.when);
    }
}

//! Throwaway account credentials for one scenario run.

use crate::fixtures::IdentityFixture;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Credentials registered at the start of a scenario and reused to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentity {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Unix timestamp the email was derived from
    pub stamp: i64,
}

impl TestIdentity {
    /// Fresh identity with the default template.
    pub fn generate() -> Self {
        Self::generate_with(&IdentityFixture::default())
    }

    /// Fresh identity whose timestamp is strictly greater than any other
    /// identity generated by this process.
    pub fn generate_with(template: &IdentityFixture) -> Self {
        Self::from_stamp(template, next_stamp(Utc::now().timestamp()))
    }

    pub fn from_stamp(template: &IdentityFixture, stamp: i64) -> Self {
        Self {
            name: template.name.clone(),
            email: format!(
                "{}{stamp}@{}",
                template.email_prefix, template.email_domain
            ),
            password: template.password.clone(),
            stamp,
        }
    }
}

/// `now`, or one past the last stamp handed out when two requests share a second.
fn next_stamp(now: i64) -> i64 {
    let previous = LAST_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_identity_matches_registration_fixture() {
        let identity = TestIdentity::from_stamp(&IdentityFixture::default(), 1_700_000_000);
        assert_eq!(identity.name, "Test User");
        assert_eq!(identity.email, "testuser_1700000000@example.com");
        assert_eq!(identity.password, "password123");
    }

    #[test]
    fn emails_are_unique_within_one_second() {
        let emails: HashSet<String> = (0..50).map(|_| TestIdentity::generate().email).collect();
        assert_eq!(emails.len(), 50);
    }

    #[test]
    fn stamps_never_go_backwards() {
        let first = TestIdentity::generate();
        let second = TestIdentity::generate();
        assert!(second.stamp > first.stamp);
        assert!(first.stamp >= Utc::now().timestamp() - 5);
    }

    #[test]
    fn template_overrides_apply() {
        let template = IdentityFixture {
            name: "QA Bot".into(),
            password: "s3cret!".into(),
            email_prefix: "qa+".into(),
            email_domain: "test.local".into(),
        };
        let identity = TestIdentity::from_stamp(&template, 42);
        assert_eq!(identity.email, "qa+42@test.local");
        assert_eq!(identity.name, "QA Bot");
    }
}

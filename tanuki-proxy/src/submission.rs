//! Validation and normalization of inbound deadline submissions.
//!
//! One `Submission` is built per submitNonce request and lives only for
//! the duration of that request.

/// A validated deadline submission from the miner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub account_id: u64,
    pub height: u64,
    pub nonce: u64,

    /// Raw (un-normalized) deadline. Pools running anti-cheat or test
    /// configurations report deadlines well past the 53-bit range that
    /// bites double-based implementations; u128 keeps the later division
    /// exact with room to spare.
    pub deadline: Option<u128>,

    /// If the miner supplies a passphrase the pool computes the deadline
    /// server-side, so `deadline` may legitimately be absent.
    pub secret_phrase: Option<String>,
}

impl Submission {
    /// Build a submission from raw query-parameter strings.
    ///
    /// Returns `None` when the request is malformed: accountId, height,
    /// and nonce must all be present and numeric, and a deadline is
    /// required unless a secret phrase is supplied.
    pub fn parse(
        account_id: Option<&str>,
        height: Option<&str>,
        nonce: Option<&str>,
        deadline: Option<&str>,
        secret_phrase: Option<String>,
    ) -> Option<Self> {
        let account_id = account_id?.parse().ok()?;
        let height = height?.parse().ok()?;
        let nonce = nonce?.parse().ok()?;
        let secret_phrase = secret_phrase.filter(|phrase| !phrase.is_empty());
        let deadline = match deadline {
            Some(raw) => Some(raw.parse().ok()?),
            None => None,
        };
        if deadline.is_none() && secret_phrase.is_none() {
            return None;
        }
        Some(Self {
            account_id,
            height,
            nonce,
            deadline,
            secret_phrase,
        })
    }

    /// Deadline in seconds, normalized by the round's base target.
    ///
    /// Integer floor division -- floating point here causes off-by-one
    /// acceptance errors at pool target boundaries.
    pub fn adjusted_deadline(&self, base_target: u64) -> Option<u64> {
        let deadline = self.deadline?;
        let adjusted = deadline / u128::from(base_target.max(1));
        Some(u64::try_from(adjusted).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(dl: Option<&str>, phrase: Option<&str>) -> Option<Submission> {
        Submission::parse(
            Some("12297376156869634540"),
            Some("100"),
            Some("68101793"),
            dl,
            phrase.map(String::from),
        )
    }

    #[test]
    fn accepts_deadline_or_secret_phrase() {
        assert!(parse_ok(Some("1000000"), None).is_some());
        assert!(parse_ok(None, Some("correct horse battery")).is_some());
        assert!(parse_ok(Some("1000000"), Some("both is fine")).is_some());
    }

    #[test]
    fn rejects_missing_or_non_numeric_fields() {
        assert!(parse_ok(None, None).is_none());
        assert!(parse_ok(Some("not-a-number"), None).is_none());
        assert!(Submission::parse(None, Some("100"), Some("1"), Some("5"), None).is_none());
        assert!(Submission::parse(Some("1"), Some("ten"), Some("1"), Some("5"), None).is_none());
        assert!(Submission::parse(Some("1"), Some("100"), None, Some("5"), None).is_none());
    }

    #[test]
    fn empty_secret_phrase_does_not_count() {
        assert!(parse_ok(None, Some("")).is_none());
    }

    #[test]
    fn adjusted_deadline_is_floor_division() {
        let sub = parse_ok(Some("1000000"), None).unwrap();
        // 1000000 / 333 = 3003.003..., floor to 3003
        assert_eq!(sub.adjusted_deadline(333), Some(3003));
    }

    #[test]
    fn adjusted_deadline_handles_oversized_values() {
        let sub = parse_ok(Some("340282366920938463463374607431768211455"), None).unwrap();
        assert_eq!(sub.adjusted_deadline(1), Some(u64::MAX));
        let phrase_only = parse_ok(None, Some("phrase")).unwrap();
        assert_eq!(phrase_only.adjusted_deadline(333), None);
    }
}

//! Per-invocation outbound call counter.

/// Counts outbound calls made during one invocation.
///
/// The limit is only consulted before starting a new candidate, so a single
/// candidate's calls may push `used` past `limit`.
#[derive(Debug, Clone)]
pub struct CallBudget {
    used: u32,
    limit: u32,
}

impl CallBudget {
    pub fn new(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    /// Start a new invocation.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Record one outbound call.
    pub fn charge(&mut self) {
        self.used = self.used.saturating_add(1);
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether another unit of work may begin.
    pub fn allows_new_unit(&self) -> bool {
        self.used < self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_checked_not_enforced() {
        let mut budget = CallBudget::new(2);
        assert!(budget.allows_new_unit());
        budget.charge();
        assert!(budget.allows_new_unit());
        budget.charge();
        assert!(!budget.allows_new_unit());
        budget.charge();
        assert_eq!(budget.used(), 3);

        budget.reset();
        assert_eq!(budget.used(), 0);
        assert!(budget.allows_new_unit());
    }
}

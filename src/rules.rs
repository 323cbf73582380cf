/// Rules module for elementary (one-dimensional, radius-1) cellular automata
///
/// A rule number in 0..=255 is the Wolfram code: bit `k` of the number is the
/// next state of a cell whose neighborhood `(left, center, right)` reads `k`
/// as a 3-bit binary number.
use rand::Rng;

use crate::error::CaError;

pub mod presets;

pub use presets::{NamedRule, NAMED_RULES};

/// 8-entry lookup table for one elementary rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleTable {
    number: u8,
    table: [u8; 8],
}

impl RuleTable {
    /// Expand a rule number into its lookup table
    pub fn new(number: u8) -> Self {
        let mut table = [0u8; 8];
        for (pattern, entry) in table.iter_mut().enumerate() {
            *entry = (number >> pattern) & 1;
        }
        Self { number, table }
    }

    /// Checked constructor for numbers coming from config or user input.
    /// Anything outside 0..=255 is rejected rather than wrapped, so rule 256
    /// can never masquerade as rule 0.
    pub fn from_number(number: i64) -> Result<Self, CaError> {
        u8::try_from(number)
            .map(Self::new)
            .map_err(|_| CaError::InvalidRule(number))
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Next state for the neighborhood `(left, center, right)`.
    /// Inputs are read as bits; only the lowest bit of each is used.
    #[inline]
    pub fn apply(&self, left: u8, center: u8, right: u8) -> u8 {
        self.table[(((left & 1) << 2) | ((center & 1) << 1) | (right & 1)) as usize]
    }

    /// The table indexed by neighborhood pattern 0..8
    pub fn table(&self) -> &[u8; 8] {
        &self.table
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        // Rule 30, the background default
        Self::new(30)
    }
}

impl From<u8> for RuleTable {
    fn from(number: u8) -> Self {
        Self::new(number)
    }
}

impl TryFrom<i64> for RuleTable {
    type Error = CaError;

    fn try_from(number: i64) -> Result<Self, Self::Error> {
        Self::from_number(number)
    }
}

impl TryFrom<u32> for RuleTable {
    type Error = CaError;

    fn try_from(number: u32) -> Result<Self, Self::Error> {
        Self::from_number(i64::from(number))
    }
}

impl std::fmt::Display for RuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rule {}", self.number)
    }
}

/// The rules a cycling sequencer may switch to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RuleSet {
    /// Every rule 0..=255
    #[default]
    All,
    /// A fixed, de-duplicated list of rules
    Only(Vec<u8>),
}

impl RuleSet {
    pub fn only(rules: impl IntoIterator<Item = u8>) -> Self {
        let mut rules: Vec<u8> = rules.into_iter().collect();
        rules.sort_unstable();
        rules.dedup();
        RuleSet::Only(rules)
    }

    /// The six named rules offered by the UI pickers
    pub fn named() -> Self {
        Self::only(NAMED_RULES.iter().map(|r| r.number))
    }

    pub fn len(&self) -> usize {
        match self {
            RuleSet::All => 256,
            RuleSet::Only(rules) => rules.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, rule: u8) -> bool {
        match self {
            RuleSet::All => true,
            RuleSet::Only(rules) => rules.binary_search(&rule).is_ok(),
        }
    }
}

impl From<Option<Vec<u8>>> for RuleSet {
    fn from(rules: Option<Vec<u8>>) -> Self {
        match rules {
            Some(rules) => RuleSet::only(rules),
            None => RuleSet::All,
        }
    }
}

/// Pick a rule from `candidates` uniformly at random, excluding `current`.
///
/// Returns `current` only when no other candidate exists (a set with a single
/// member, or an empty set).
pub fn pick_different<R: Rng + ?Sized>(current: u8, candidates: &RuleSet, rng: &mut R) -> u8 {
    match candidates {
        RuleSet::All => {
            // 255 choices; skip over `current`
            let pick = rng.random_range(0..255u16) as u8;
            if pick >= current {
                pick + 1
            } else {
                pick
            }
        }
        RuleSet::Only(rules) => {
            let others: Vec<u8> = rules.iter().copied().filter(|&r| r != current).collect();
            if others.is_empty() {
                return rules.first().copied().unwrap_or(current);
            }
            others[rng.random_range(0..others.len())]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rule_30_expands_to_its_binary_digits() {
        // 30 = 0b00011110
        let rule = RuleTable::new(30);
        assert_eq!(rule.table(), &[0, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(rule.apply(1, 1, 1), 0);
        assert_eq!(rule.apply(1, 0, 0), 1);
        assert_eq!(rule.apply(0, 0, 1), 1);
        assert_eq!(rule.apply(0, 0, 0), 0);
    }

    #[test]
    fn apply_is_stable() {
        for number in 0..=255u8 {
            let rule = RuleTable::new(number);
            for pattern in 0..8u8 {
                let (l, c, r) = (pattern >> 2, (pattern >> 1) & 1, pattern & 1);
                let first = rule.apply(l, c, r);
                assert_eq!(first, rule.apply(l, c, r));
                assert_eq!(first, (number >> pattern) & 1);
            }
        }
    }

    #[test]
    fn out_of_range_rules_are_rejected() {
        assert_eq!(RuleTable::from_number(256), Err(CaError::InvalidRule(256)));
        assert_eq!(RuleTable::from_number(-1), Err(CaError::InvalidRule(-1)));
        assert!(RuleTable::try_from(300u32).is_err());
        assert_eq!(RuleTable::from_number(255).map(|r| r.number()), Ok(255));
        assert_eq!(RuleTable::from_number(0).map(|r| r.number()), Ok(0));
    }

    #[test]
    fn pick_different_never_returns_current() {
        let mut rng = StdRng::seed_from_u64(7);
        for current in [0u8, 30, 128, 255] {
            for _ in 0..200 {
                assert_ne!(pick_different(current, &RuleSet::All, &mut rng), current);
            }
        }

        let named = RuleSet::named();
        for _ in 0..100 {
            let pick = pick_different(110, &named, &mut rng);
            assert_ne!(pick, 110);
            assert!(named.contains(pick));
        }
    }

    #[test]
    fn pick_different_single_member_falls_back() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_different(90, &RuleSet::only([90]), &mut rng), 90);
        // The only candidate wins even when it is not the current rule
        assert_eq!(pick_different(30, &RuleSet::only([90]), &mut rng), 90);
    }

    #[test]
    fn rule_set_deduplicates() {
        let set = RuleSet::only([30, 30, 90]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(90));
        assert!(!set.contains(110));
    }
}

use super::RuleTable;

/// A rule offered by the rule pickers, with a label for the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedRule {
    pub number: u8,
    pub name: &'static str,
    pub description: &'static str,
}

impl NamedRule {
    pub fn table(&self) -> RuleTable {
        RuleTable::new(self.number)
    }
}

/// Named rules in picker order
pub const NAMED_RULES: [NamedRule; 6] = [
    NamedRule {
        number: 30,
        name: "Rule 30",
        description: "Chaotic; its center column passes randomness tests",
    },
    NamedRule {
        number: 90,
        name: "Rule 90",
        description: "Sierpinski triangle (XOR of the two neighbors)",
    },
    NamedRule {
        number: 110,
        name: "Rule 110",
        description: "Localized structures; Turing complete",
    },
    NamedRule {
        number: 54,
        name: "Rule 54",
        description: "Interacting particles on a periodic background",
    },
    NamedRule {
        number: 150,
        name: "Rule 150",
        description: "Additive; XOR of the whole neighborhood",
    },
    NamedRule {
        number: 126,
        name: "Rule 126",
        description: "Nested triangles with a noisy interior",
    },
];

/// Look up the picker entry for a rule number
pub fn named(number: u8) -> Option<&'static NamedRule> {
    NAMED_RULES.iter().find(|r| r.number == number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_rules_keep_picker_order() {
        let numbers: Vec<u8> = NAMED_RULES.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![30, 90, 110, 54, 150, 126]);
    }

    #[test]
    fn lookup_by_number() {
        assert_eq!(named(110).map(|r| r.name), Some("Rule 110"));
        assert!(named(184).is_none());
        assert_eq!(named(90).map(|r| r.table().number()), Some(90));
    }
}

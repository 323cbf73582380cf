use crate::state::State;
use gpu_eca::rules::{pick_different, NAMED_RULES};
use gpu_eca::{Phase, RuleSet, RuleTable};
use std::time::Duration;
use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{Key, NamedKey},
};

pub const MIN_TICK_MS: u64 = 30;
pub const MAX_TICK_MS: u64 = 1000;

/// Something the user asked for, from the keyboard or the side panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SetRule(u8),
    RandomRule,
    ToggleCycling,
    /// Stop when running, restart otherwise
    TogglePause,
    Restart,
    ToggleMenu,
    SetTickInterval(u64),
}

/// Keyboard shortcuts: 1-6 pick the named rules, R a random rule,
/// C toggles cycling, Space pauses/resumes, Enter restarts, M the menu.
pub fn action_for_key(event: &KeyEvent) -> Option<Action> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    match &event.logical_key {
        Key::Named(NamedKey::Space) => Some(Action::TogglePause),
        Key::Named(NamedKey::Enter) => Some(Action::Restart),
        Key::Character(ch) => match ch.as_str() {
            "r" | "R" => Some(Action::RandomRule),
            "c" | "C" => Some(Action::ToggleCycling),
            "m" | "M" => Some(Action::ToggleMenu),
            digit => digit
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| NAMED_RULES.get(i))
                .map(|r| Action::SetRule(r.number)),
        },
        _ => None,
    }
}

pub fn apply(state: &mut State, action: Action) {
    match action {
        Action::SetRule(number) => {
            state.sequencer.set_rule(RuleTable::new(number));
        }
        Action::RandomRule => {
            let current = state.sequencer.rule().number();
            let next = pick_different(current, &RuleSet::All, &mut rand::rng());
            state.sequencer.set_rule(RuleTable::new(next));
        }
        Action::ToggleCycling => {
            let enabled = !state.sequencer.is_cycling();
            state.sequencer.set_cycling(enabled);
            log::info!("Rule cycling {}", if enabled { "enabled" } else { "disabled" });
        }
        Action::TogglePause => {
            if state.sequencer.phase() == Phase::Stopped {
                state.sequencer.restart();
            } else {
                state.sequencer.stop();
            }
        }
        Action::Restart => state.sequencer.restart(),
        Action::ToggleMenu => state.menu_open = !state.menu_open,
        Action::SetTickInterval(ms) => {
            let ms = ms.clamp(MIN_TICK_MS, MAX_TICK_MS);
            state.ticker.set_interval(Duration::from_millis(ms));
            state.settings.tick_interval_ms = ms;
            log::info!("Tick interval set to {} ms", ms);
        }
    }
}

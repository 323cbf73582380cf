use crate::error::BackendError;

/// Notifications emitted by an [`AnimationSequencer`](crate::sequencer::AnimationSequencer).
///
/// UI layers subscribe to these instead of the sequencer knowing about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    /// A generation was appended to the log
    Advanced { generation: usize },
    /// The last row was reached
    Completed { rule: u8, generations: usize },
    /// The active rule changed and the log was reseeded
    RuleChanged { previous: u8, current: u8 },
    /// Dimensions changed and the log was re-centered
    Resized { cols: usize, rows: usize },
    /// Ticking halted, either explicitly or after an error
    Stopped,
    /// The compute backend failed; the sequencer stopped
    Error(BackendError),
}

pub type Listener = Box<dyn FnMut(&SequencerEvent)>;

/// Fan-out of events to subscribed listeners
#[derive(Default)]
pub struct EventHub {
    listeners: Vec<Listener>,
}

impl EventHub {
    pub fn subscribe(&mut self, listener: impl FnMut(&SequencerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: SequencerEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

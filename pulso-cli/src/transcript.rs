//! Local chat transcript for the `chat` REPL.
//!
//! A user line starts `Pending` and settles exactly once: `Confirmed` when the
//! server answers, `Failed` when it does not. A failed turn gets a local
//! fallback reply that is shown but never sent to the server.

/// Shown in place of an assistant reply when a turn fails.
pub const CHAT_FALLBACK: &str =
    "Lo siento, no pude responder en este momento. Inténtalo de nuevo en unos segundos.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Patient,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Confirmed,
    Failed,
    /// Client-side only, never persisted.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub speaker: Speaker,
    pub text: String,
    pub state: EntryState,
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the transcript with stored history, all confirmed.
    pub fn from_history(history: impl IntoIterator<Item = (Speaker, String)>) -> Self {
        let entries = history
            .into_iter()
            .map(|(speaker, text)| Entry {
                speaker,
                text,
                state: EntryState::Confirmed,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Appends a pending user line and returns its index.
    pub fn begin_turn(&mut self, text: impl Into<String>) -> usize {
        self.entries.push(Entry {
            speaker: Speaker::Patient,
            text: text.into(),
            state: EntryState::Pending,
        });
        self.entries.len() - 1
    }

    /// Settles a pending turn with the server reply. Returns false if the
    /// index is not a pending entry.
    pub fn confirm(&mut self, turn: usize, reply: impl Into<String>) -> bool {
        if !self.settle(turn, EntryState::Confirmed) {
            return false;
        }
        self.entries.push(Entry {
            speaker: Speaker::Assistant,
            text: reply.into(),
            state: EntryState::Confirmed,
        });
        true
    }

    /// Marks a pending turn failed and appends the local fallback reply.
    pub fn fail(&mut self, turn: usize) -> bool {
        if !self.settle(turn, EntryState::Failed) {
            return false;
        }
        self.entries.push(Entry {
            speaker: Speaker::Assistant,
            text: CHAT_FALLBACK.to_string(),
            state: EntryState::Local,
        });
        true
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    fn settle(&mut self, turn: usize, state: EntryState) -> bool {
        match self.entries.get_mut(turn) {
            Some(entry) if entry.state == EntryState::Pending => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmed_turn_appends_reply() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hola");
        assert_eq!(t.entries()[turn].state, EntryState::Pending);

        assert!(t.confirm(turn, "¡Hola!"));
        assert_eq!(t.entries()[turn].state, EntryState::Confirmed);
        let last = t.last().unwrap();
        assert_eq!(last.speaker, Speaker::Assistant);
        assert_eq!(last.text, "¡Hola!");
    }

    #[test]
    fn test_failed_turn_appends_local_fallback() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("me duele");
        assert!(t.fail(turn));
        assert_eq!(t.entries()[turn].state, EntryState::Failed);
        let last = t.last().unwrap();
        assert_eq!(last.text, CHAT_FALLBACK);
        assert_eq!(last.state, EntryState::Local);
    }

    #[test]
    fn test_turn_settles_only_once() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("x");
        assert!(t.confirm(turn, "y"));
        assert!(!t.fail(turn));
        assert!(!t.confirm(turn, "z"));
        assert_eq!(t.entries().len(), 2);
    }

    #[test]
    fn test_history_seeds_confirmed_entries() {
        let t = Transcript::from_history(vec![
            (Speaker::Assistant, "bienvenido".to_string()),
            (Speaker::Patient, "gracias".to_string()),
        ]);
        assert_eq!(t.entries().len(), 2);
        assert!(t.entries().iter().all(|e| e.state == EntryState::Confirmed));
        assert!(Transcript::new().last().is_none());
    }
}

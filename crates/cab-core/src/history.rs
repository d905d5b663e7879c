use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::{ChatId, ImageNote, Role, Turn};

/// Sliding-window size per conversation.
pub const MAX_TURNS: usize = 16;

#[derive(Debug, Default)]
struct StoreInner {
    histories: HashMap<ChatId, VecDeque<Turn>>,
    next_seq: u64,
}

/// Per-conversation bounded message history.
///
/// Each chat keeps at most [`MAX_TURNS`] turns, oldest evicted first.
/// Histories are created lazily on first append and dropped on reset;
/// nothing is persisted across restarts. Sequence numbers come from a
/// single store-wide counter and are never reused, so a retract issued by
/// a stale in-flight request can only ever match the turn it appended,
/// even if the conversation was reset and refilled in the meantime. The
/// single mutex guards plain in-memory operations only and is never held
/// across an await point.
#[derive(Default)]
pub struct ConversationStore {
    inner: Mutex<StoreInner>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its assigned sequence number.
    ///
    /// Evicts from the front once the window overflows; the remaining
    /// turns keep their relative order.
    pub fn append(
        &self,
        chat: ChatId,
        role: Role,
        text: String,
        image: Option<ImageNote>,
    ) -> u64 {
        let mut inner = self.inner.lock().expect("history lock poisoned");

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let turns = inner.histories.entry(chat).or_default();
        turns.push_back(Turn {
            role,
            text,
            image,
            seq,
        });
        while turns.len() > MAX_TURNS {
            turns.pop_front();
        }
        seq
    }

    /// Current history for use as model context. A pure read: repeated
    /// calls return the same turns until the next mutation.
    pub fn snapshot(&self, chat: ChatId) -> Vec<Turn> {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner
            .histories
            .get(&chat)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop the conversation entirely.
    pub fn reset(&self, chat: ChatId) {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        inner.histories.remove(&chat);
    }

    /// Remove the turn with the given sequence number, if still present.
    ///
    /// Used to roll back a provisionally appended user turn after a failed
    /// model call so the context never carries an orphaned user message.
    /// Sequence numbers are store-wide unique, so this is a no-op when the
    /// turn was already evicted or the conversation was reset underneath
    /// the in-flight request.
    pub fn retract(&self, chat: ChatId, seq: u64) -> bool {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        let Some(turns) = inner.histories.get_mut(&chat) else {
            return false;
        };
        match turns.iter().position(|t| t.seq == seq) {
            Some(pos) => {
                turns.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self, chat: ChatId) -> usize {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner.histories.get(&chat).map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, chat: ChatId) -> bool {
        self.len(chat) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: ChatId = ChatId(42);

    fn push(store: &ConversationStore, role: Role, text: &str) -> u64 {
        store.append(CHAT, role, text.to_string(), None)
    }

    #[test]
    fn unknown_chat_snapshots_empty() {
        let store = ConversationStore::new();
        assert!(store.snapshot(ChatId(1)).is_empty());
        assert!(store.is_empty(ChatId(1)));
    }

    #[test]
    fn window_keeps_the_last_sixteen_turns_in_order() {
        let store = ConversationStore::new();
        // 20 user/assistant pairs.
        for i in 0..20 {
            push(&store, Role::User, &format!("q{i}"));
            push(&store, Role::Assistant, &format!("a{i}"));
        }

        let turns = store.snapshot(CHAT);
        assert_eq!(turns.len(), MAX_TURNS);
        // 40 appends, so the surviving window is seq 24..40.
        let seqs: Vec<u64> = turns.iter().map(|t| t.seq).collect();
        assert_eq!(seqs, (24..40).collect::<Vec<u64>>());
        assert_eq!(turns[0].text, "q12");
        assert_eq!(turns[15].text, "a19");
    }

    #[test]
    fn length_never_exceeds_the_window_mid_stream() {
        let store = ConversationStore::new();
        for i in 0..50 {
            push(&store, Role::User, &format!("m{i}"));
            assert!(store.len(CHAT) <= MAX_TURNS);
        }
    }

    #[test]
    fn reset_discards_the_history() {
        let store = ConversationStore::new();
        let before = push(&store, Role::User, "hello");
        store.reset(CHAT);
        assert!(store.snapshot(CHAT).is_empty());

        // Sequence numbers are never reused, reset or not.
        let after = push(&store, Role::User, "again");
        assert!(after > before);
    }

    #[test]
    fn retract_removes_only_the_matching_turn() {
        let store = ConversationStore::new();
        let a = push(&store, Role::User, "first");
        let b = push(&store, Role::User, "second");
        let c = push(&store, Role::User, "third");

        assert!(store.retract(CHAT, b));
        let seqs: Vec<u64> = store.snapshot(CHAT).iter().map(|t| t.seq).collect();
        assert_eq!(seqs, vec![a, c]);

        // Already gone (or evicted): a no-op.
        assert!(!store.retract(CHAT, b));
        assert!(!store.retract(ChatId(7), a));
    }

    #[test]
    fn retract_after_reset_cannot_touch_the_fresh_conversation() {
        let store = ConversationStore::new();

        // A request appends its provisional turn, then the user resets and
        // starts over while that request is still in flight.
        let stale = push(&store, Role::User, "in flight");
        store.reset(CHAT);
        let fresh = push(&store, Role::User, "new topic");
        assert_ne!(stale, fresh);

        // The late rollback must miss: the fresh turn stays.
        assert!(!store.retract(CHAT, stale));
        let turns = store.snapshot(CHAT);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].seq, fresh);
        assert_eq!(turns[0].text, "new topic");
    }

    #[test]
    fn conversations_do_not_interfere() {
        let store = ConversationStore::new();
        store.append(ChatId(1), Role::User, "one".to_string(), None);
        store.append(ChatId(2), Role::User, "two".to_string(), None);

        store.reset(ChatId(1));
        assert!(store.snapshot(ChatId(1)).is_empty());
        assert_eq!(store.snapshot(ChatId(2)).len(), 1);
    }
}

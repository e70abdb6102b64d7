use crate::infrastructure::config::DEFAULT_PROHIBITED_WORDS;
use crate::infrastructure::error::ClientError;
use crate::infrastructure::storage::LocalStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const PROHIBITED_WORDS_KEY: &str = "prohibitedWords";

/// Local deny-list of lowercase words. Independent of the server session.
pub struct ContentPolicy<L: LocalStore + ?Sized> {
    store: Arc<L>,
    default_words: Vec<String>,
    words: Mutex<Vec<String>>,
}

impl<L: LocalStore + ?Sized> ContentPolicy<L> {
    pub fn new(store: Arc<L>) -> Result<Self, ClientError> {
        Self::with_default_words(
            store,
            DEFAULT_PROHIBITED_WORDS.iter().map(|word| word.to_string()).collect(),
        )
    }

    /// Loads the persisted list. A missing or unreadable list is replaced by
    /// the defaults, which are persisted right away.
    pub fn with_default_words(
        store: Arc<L>,
        default_words: Vec<String>,
    ) -> Result<Self, ClientError> {
        let default_words = normalize_list(default_words);
        let persisted = match store.get_item(PROHIBITED_WORDS_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(words) => Some(normalize_list(words)),
                Err(error) => {
                    tracing::warn!(%error, "prohibited word list unreadable, restoring defaults");
                    None
                }
            },
            None => None,
        };

        let policy = Self {
            store,
            words: Mutex::new(persisted.clone().unwrap_or_else(|| default_words.clone())),
            default_words,
        };
        if persisted.is_none() {
            policy.persist(&policy.lock_words())?;
        }
        Ok(policy)
    }

    pub fn words(&self) -> Vec<String> {
        self.lock_words().clone()
    }

    pub fn is_prohibited(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lower_text = text.to_lowercase();
        self.lock_words()
            .iter()
            .any(|word| lower_text.contains(word.as_str()))
    }

    pub fn add(&self, word: &str) -> Result<(), ClientError> {
        let Some(word) = normalize_word(word) else {
            return Ok(());
        };
        let mut words = self.lock_words();
        if words.contains(&word) {
            return Ok(());
        }
        words.push(word);
        self.persist(&words)
    }

    pub fn remove(&self, word: &str) -> Result<(), ClientError> {
        let Some(word) = normalize_word(word) else {
            return Ok(());
        };
        let mut words = self.lock_words();
        words.retain(|candidate| *candidate != word);
        self.persist(&words)
    }

    pub fn reset_to_default(&self) -> Result<(), ClientError> {
        let mut words = self.lock_words();
        *words = self.default_words.clone();
        self.persist(&words)
    }

    fn persist(&self, words: &[String]) -> Result<(), ClientError> {
        let payload = serde_json::to_string(words)?;
        self.store.set_item(PROHIBITED_WORDS_KEY, &payload)
    }

    fn lock_words(&self) -> MutexGuard<'_, Vec<String>> {
        self.words.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize_word(word: &str) -> Option<String> {
    let word = word.trim().to_lowercase();
    (!word.is_empty()).then_some(word)
}

fn normalize_list(words: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(words.len());
    for word in words.iter().filter_map(|word| normalize_word(word)) {
        if !normalized.contains(&word) {
            normalized.push(word);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryLocalStore;
    use proptest::prelude::*;

    fn policy() -> (Arc<InMemoryLocalStore>, ContentPolicy<InMemoryLocalStore>) {
        let store = Arc::new(InMemoryLocalStore::default());
        let policy = ContentPolicy::new(Arc::clone(&store)).expect("policy");
        (store, policy)
    }

    fn persisted(store: &InMemoryLocalStore) -> Vec<String> {
        let raw = store
            .get_item(PROHIBITED_WORDS_KEY)
            .expect("get")
            .expect("list persisted");
        serde_json::from_str(&raw).expect("json list")
    }

    #[test]
    fn seeds_and_persists_defaults() {
        let (store, policy) = policy();
        assert_eq!(policy.words(), vec!["badword1", "badword2", "badword3"]);
        assert_eq!(persisted(&store), policy.words());
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let (_, policy) = policy();
        policy.add("spam").expect("add");
        assert!(policy.is_prohibited("This is SPAMtastic"));
        assert!(policy.is_prohibited("buy BadWord1 milk"));
        assert!(!policy.is_prohibited("buy milk"));
        assert!(!policy.is_prohibited(""));
    }

    #[test]
    fn add_then_remove_normalizes_words() {
        let (store, policy) = policy();
        policy.add("  Foo ").expect("add");
        policy.add("FOO").expect("add duplicate");
        assert_eq!(policy.words().iter().filter(|word| *word == "foo").count(), 1);
        assert!(persisted(&store).contains(&"foo".to_string()));

        policy.remove("foo").expect("remove");
        assert!(!policy.words().contains(&"foo".to_string()));
        assert!(!persisted(&store).contains(&"foo".to_string()));
    }

    #[test]
    fn empty_words_are_ignored() {
        let (_, policy) = policy();
        policy.add("   ").expect("add blank");
        assert_eq!(policy.words().len(), 3);
        assert!(!policy.is_prohibited("anything"));
    }

    #[test]
    fn reset_restores_seed_list() {
        let (store, policy) = policy();
        policy.remove("badword2").expect("remove");
        policy.add("spam").expect("add");
        policy.reset_to_default().expect("reset");
        assert_eq!(policy.words(), vec!["badword1", "badword2", "badword3"]);
        assert_eq!(persisted(&store), policy.words());
    }

    #[test]
    fn loads_persisted_list_and_recovers_from_corruption() {
        let store = Arc::new(InMemoryLocalStore::default());
        store
            .set_item(PROHIBITED_WORDS_KEY, r#"["Spam","eggs","spam"]"#)
            .expect("set");
        let policy = ContentPolicy::new(Arc::clone(&store)).expect("policy");
        assert_eq!(policy.words(), vec!["spam", "eggs"]);

        store.set_item(PROHIBITED_WORDS_KEY, "{broken").expect("set");
        let policy = ContentPolicy::new(Arc::clone(&store)).expect("policy");
        assert_eq!(policy.words(), vec!["badword1", "badword2", "badword3"]);
        assert_eq!(persisted(&store), policy.words());
    }

    proptest! {
        #[test]
        fn added_word_is_found_inside_any_casing(
            prefix in "[a-z ]{0,8}",
            word in "[a-z]{1,8}",
            suffix in "[a-z ]{0,8}"
        ) {
            let (_, policy) = policy();
            policy.add(&word.to_uppercase()).expect("add");
            let text = format!("{prefix}{}{suffix}", word.to_uppercase());
            prop_assert!(policy.is_prohibited(&text));

            policy.remove(&word).expect("remove");
            prop_assert!(!policy.words().contains(&word));
        }
    }
}

use indexmap::IndexSet;

/// Распознанные слова за сессию: без повторов, в порядке первого появления
#[derive(Debug, Default, Clone)]
pub struct LabelSet {
    labels: IndexSet<String>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true`, если слово новое
    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        self.labels.insert(label.into())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    /// Отдаёт накопленные слова и очищает набор
    pub fn consume(&mut self) -> Vec<String> {
        std::mem::take(&mut self.labels).into_iter().collect()
    }

    /// Возвращает ранее забранные слова в начало набора
    pub fn restore(&mut self, earlier: Vec<String>) {
        let later = std::mem::take(&mut self.labels);
        self.labels = earlier.into_iter().chain(later).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_seen_order_without_duplicates() {
        let mut set = LabelSet::new();
        assert!(set.insert("hello"));
        assert!(set.insert("thanks"));
        assert!(!set.insert("hello"));
        assert!(set.insert("goodbye"));

        assert_eq!(set.consume(), vec!["hello", "thanks", "goodbye"]);
        assert!(set.is_empty());
        assert!(set.consume().is_empty());
    }

    #[test]
    fn restore_puts_earlier_words_first() {
        let mut set = LabelSet::new();
        set.insert("late");
        set.restore(vec!["early".into(), "late".into()]);
        assert_eq!(set.snapshot(), vec!["early", "late"]);
    }
}

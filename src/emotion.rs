use serde::Serialize;

/// The seven emotion categories, in the positional order the classifier was
/// trained with. `from_index` relies on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
        }
    }

    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }
}

/// Index of the highest score. Ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .map(|(index, value)| (index, *value))
        .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        .map(|(index, _)| index)
}

/// Most frequent label in the batch. Ties resolve to the label seen first.
pub fn most_frequent(labels: &[Emotion]) -> Option<Emotion> {
    let mut winner = None;
    let mut winner_count = 0;

    for label in labels {
        let count = labels
            .iter()
            .filter(|candidate| *candidate == label)
            .count();
        if count > winner_count {
            winner = Some(*label);
            winner_count = count;
        }
    }

    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_order_is_positional() {
        let expected = [
            "Angry", "Disgust", "Fear", "Happy", "Sad", "Surprise", "Neutral",
        ];
        for (index, name) in expected.iter().enumerate() {
            assert_eq!(Emotion::from_index(index).unwrap().as_str(), *name);
        }
        assert_eq!(Emotion::from_index(7), None);
    }

    #[test]
    fn test_argmax_picks_highest_score() {
        let scores = vec![0.01, 0.02, 0.05, 0.80, 0.07, 0.03, 0.02];
        assert_eq!(argmax(&scores), Some(3));
    }

    #[test]
    fn test_argmax_resolves_ties_to_lowest_index() {
        let scores = vec![0.1, 0.4, 0.4, 0.1];
        assert_eq!(argmax(&scores), Some(1));
    }

    #[test]
    fn test_argmax_on_empty_scores() {
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_majority_label_wins() {
        let labels = vec![Emotion::Happy, Emotion::Happy, Emotion::Sad];
        assert_eq!(most_frequent(&labels), Some(Emotion::Happy));
    }

    #[test]
    fn test_tie_resolves_to_first_seen() {
        let labels = vec![Emotion::Happy, Emotion::Sad, Emotion::Happy, Emotion::Sad];
        assert_eq!(most_frequent(&labels), Some(Emotion::Happy));

        let labels = vec![Emotion::Sad, Emotion::Happy, Emotion::Sad, Emotion::Happy];
        assert_eq!(most_frequent(&labels), Some(Emotion::Sad));
    }

    #[test]
    fn test_empty_batch_has_no_mode() {
        assert_eq!(most_frequent(&[]), None);
    }

    #[test]
    fn test_single_label_batch() {
        assert_eq!(most_frequent(&[Emotion::Fear]), Some(Emotion::Fear));
    }
}

//! Emotion classes and the table that maps class indices to labels.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::error::{FerError, FerResult};

/// One of the eight FER+ emotion classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Emotion {
    Neutral,
    Happiness,
    Surprise,
    Sadness,
    Anger,
    Disgust,
    Fear,
    Contempt,
}

impl Emotion {
    /// All classes in model output order.
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happiness,
        Emotion::Surprise,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Contempt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happiness => "happiness",
            Emotion::Surprise => "surprise",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Contempt => "contempt",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.as_str() == needle)
            .ok_or_else(|| format!("unknown emotion '{s}'"))
    }
}

impl Serialize for Emotion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Immutable mapping from model class index to [`Emotion`].
///
/// Built once at startup and handed to the components that need it: the
/// model wrapper (auxiliary table input) and the labeler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionTable {
    entries: Vec<Emotion>,
}

impl Default for EmotionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl EmotionTable {
    /// The FER+ ordering: neutral, happiness, surprise, sadness, anger, disgust, fear, contempt.
    pub fn standard() -> Self {
        Self {
            entries: Emotion::ALL.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Emotion> {
        self.entries.get(index).copied()
    }

    pub fn entries(&self) -> &[Emotion] {
        &self.entries
    }

    /// Class indices `0..len`, the payload of the auxiliary model input.
    pub fn class_indices(&self) -> Vec<i64> {
        (0..self.entries.len() as i64).collect()
    }

    /// Map the first `n` ranked class indices to emotions, most probable first.
    ///
    /// Fails with [`FerError::InvalidArgument`] when `n` is outside
    /// `1..=len`, when `ranked` holds fewer than `n` indices, or when an index
    /// does not belong to the table.
    pub fn label(&self, ranked: &[usize], n: usize) -> FerResult<Vec<Emotion>> {
        self.validate_top_n(n)?;
        if ranked.len() < n {
            return Err(FerError::InvalidArgument(format!(
                "requested {n} labels but only {} ranked classes are available",
                ranked.len()
            )));
        }
        ranked[..n]
            .iter()
            .map(|&index| {
                self.get(index).ok_or_else(|| {
                    FerError::InvalidArgument(format!(
                        "class index {index} is outside the {}-entry emotion table",
                        self.len()
                    ))
                })
            })
            .collect()
    }

    /// Check that `n` is a usable top-N count for this table.
    pub fn validate_top_n(&self, n: usize) -> FerResult<()> {
        if n == 0 || n > self.len() {
            return Err(FerError::InvalidArgument(format!(
                "top-N must be between 1 and {}, got {n}",
                self.len()
            )));
        }
        Ok(())
    }
}

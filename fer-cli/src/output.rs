//! JSON output records.

use std::{
    fs::{self, File},
    io::BufWriter,
    path::Path,
};

use anyhow::{Context, Result};
use fer_core::{BatchReport, ClassifiedImage, Emotion, EmotionTable, StageTimings};
use log::info;
use serde::{Serialize, Serializer, ser::SerializeMap};

/// One line of the report, e.g.
/// `{"image": "faces/a.png", "result": ["happiness"], "runtime": {...}}`.
#[derive(Debug, Serialize)]
pub struct ImageRecord {
    pub image: String,
    pub result: Vec<Emotion>,
    pub runtime: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreMap>,
}

/// Label to probability map that keeps emotion table order when serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMap(pub Vec<(Emotion, f32)>);

impl Serialize for ScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (emotion, probability) in &self.0 {
            map.serialize_entry(emotion.as_str(), probability)?;
        }
        map.end()
    }
}

impl ImageRecord {
    pub fn from_classified(
        classified: &ClassifiedImage,
        table: &EmotionTable,
        include_scores: bool,
    ) -> Self {
        let result = &classified.result;
        Self {
            image: classified.path.display().to_string(),
            result: result.labels.clone(),
            runtime: result.timings,
            scores: include_scores.then(|| ScoreMap(result.probabilities(table).collect())),
        }
    }
}

/// Records for every successful image, in input order.
pub fn build_records(
    report: &BatchReport,
    table: &EmotionTable,
    include_scores: bool,
) -> Vec<ImageRecord> {
    report
        .results
        .iter()
        .map(|classified| ImageRecord::from_classified(classified, table, include_scores))
        .collect()
}

/// Write records as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_records(records: &[ImageRecord], path: Option<&Path>) -> Result<()> {
    match path {
        Some(json_path) => {
            if let Some(dir) = json_path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create directory {}", dir.display()))?;
            }
            let file = File::create(json_path)
                .with_context(|| format!("failed to create {}", json_path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), records).with_context(|| {
                format!("failed to write emotion JSON to {}", json_path.display())
            })?;
            info!("Wrote {} record(s) to {}", records.len(), json_path.display());
        }
        None => {
            let json =
                serde_json::to_string_pretty(records).context("failed to serialize results")?;
            println!("{json}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fer_core::{EmotionResult, Scores};
    use std::{path::PathBuf, time::Duration};

    fn classified() -> ClassifiedImage {
        ClassifiedImage {
            path: PathBuf::from("faces/a.png"),
            result: EmotionResult {
                labels: vec![Emotion::Happiness, Emotion::Neutral],
                timings: StageTimings {
                    grayscale: Duration::from_millis(1),
                    resize: Duration::from_millis(2),
                    model: Duration::from_millis(4),
                },
                scores: Scores {
                    probabilities: vec![0.2, 0.7, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0],
                    ranking: vec![1, 0, 2, 3, 4, 5, 6, 7],
                },
            },
        }
    }

    #[test]
    fn record_without_scores_has_three_fields() {
        let record = ImageRecord::from_classified(&classified(), &EmotionTable::standard(), false);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image"], "faces/a.png");
        assert_eq!(json["result"], serde_json::json!(["happiness", "neutral"]));
        assert_eq!(json["runtime"]["model"], 0.004);
        assert!(json.get("scores").is_none());
    }

    #[test]
    fn scores_keep_table_order() {
        let record = ImageRecord::from_classified(&classified(), &EmotionTable::standard(), true);
        let text = serde_json::to_string(&record).unwrap();
        let neutral = text.find("\"neutral\":").unwrap();
        let contempt = text.find("\"contempt\":").unwrap();
        assert!(neutral < contempt);
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!((json["scores"]["happiness"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }
}

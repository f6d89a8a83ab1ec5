//! Label tables: display names and colours of model output classes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::LabelFileError;

/// Palette used for labels without an explicit colour, indexed by
/// `id % 10`.
pub const DEFAULT_COLORS: [[u8; 3]; 10] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
    [255, 128, 0],
    [128, 0, 255],
    [0, 255, 128],
    [128, 255, 0],
];

/// Default colour of label `id`.
#[must_use]
pub fn default_color(id: usize) -> [u8; 3] {
    DEFAULT_COLORS[id % DEFAULT_COLORS.len()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub name: String,
    pub color: [u8; 3],
}

/// Immutable map from label id to [`Label`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelTable {
    labels: BTreeMap<usize, Label>,
}

impl LabelTable {
    /// Table of `names` with ids `0..names.len()` and default colours.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = names
            .into_iter()
            .enumerate()
            .map(|(id, name)| {
                (
                    id,
                    Label {
                        name: name.into(),
                        color: default_color(id),
                    },
                )
            })
            .collect();
        Self { labels }
    }

    /// `class_0` .. `class_{k-1}`, for models used without a label file.
    #[must_use]
    pub fn numbered(k: usize) -> Self {
        Self::from_names((0..k).map(|id| format!("class_{id}")))
    }

    /// Label with id `id`.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Label> {
        self.labels.get(&id)
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table holds no label.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Label)> {
        self.labels.iter().map(|(&id, l)| (id, l))
    }
}

/// Reads a label file.
///
/// # Errors
///
/// Returns [`LabelFileError`] when the file cannot be read or parsed.
pub fn load_labels(path: &Path) -> Result<LabelTable, LabelFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| LabelFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_labels(&text)
}

/// Parses label JSON in one of three layouts:
///
/// - `{"0": "hole", "1": "slot"}`
/// - `{"0": {"name": "hole", "color": [255, 0, 0]}}`
/// - `{"names": ["hole", "slot"], "colors": [[255, 0, 0], [0, 255, 0]]}`
///
/// Missing colours come from [`DEFAULT_COLORS`]; components are clamped to
/// `0..=255`.
///
/// # Errors
///
/// Returns [`LabelFileError`] for malformed JSON, ids, colours or layouts,
/// and for an empty table.
pub fn parse_labels(text: &str) -> Result<LabelTable, LabelFileError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = value else {
        return Err(LabelFileError::Layout("expected a JSON object".into()));
    };
    let labels = if map.contains_key("names") {
        parse_lists(&map)?
    } else {
        parse_keyed(&map)?
    };
    if labels.is_empty() {
        return Err(LabelFileError::Empty);
    }
    Ok(LabelTable { labels })
}

fn parse_lists(map: &Map<String, Value>) -> Result<BTreeMap<usize, Label>, LabelFileError> {
    let Some(Value::Array(names)) = map.get("names") else {
        return Err(LabelFileError::Layout("\"names\" must be an array".into()));
    };
    let colors = match map.get("colors") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(c)) => c.as_slice(),
        Some(_) => return Err(LabelFileError::Layout("\"colors\" must be an array".into())),
    };
    names
        .iter()
        .enumerate()
        .map(|(id, name)| {
            let Value::String(name) = name else {
                return Err(LabelFileError::Layout(format!("name of label {id} is not a string")));
            };
            let color = colors.get(id).map(|c| parse_color(id, c)).transpose()?;
            Ok((
                id,
                Label {
                    name: name.clone(),
                    color: color.unwrap_or_else(|| default_color(id)),
                },
            ))
        })
        .collect()
}

fn parse_keyed(map: &Map<String, Value>) -> Result<BTreeMap<usize, Label>, LabelFileError> {
    let mut labels = BTreeMap::new();
    for (key, entry) in map {
        let id: usize = key
            .trim()
            .parse()
            .map_err(|_| LabelFileError::InvalidId(key.clone()))?;
        let label = match entry {
            Value::String(name) => Label {
                name: name.clone(),
                color: default_color(id),
            },
            Value::Object(fields) => {
                let name = match fields.get("name") {
                    Some(Value::String(n)) => n.clone(),
                    None => format!("class_{id}"),
                    Some(_) => {
                        return Err(LabelFileError::Layout(format!("name of label {id} is not a string")))
                    }
                };
                let color = match fields.get("color") {
                    None | Some(Value::Null) => default_color(id),
                    Some(c) => parse_color(id, c)?,
                };
                Label { name, color }
            }
            _ => {
                return Err(LabelFileError::Layout(format!(
                    "label {id} must be a string or an object"
                )))
            }
        };
        labels.insert(id, label);
    }
    Ok(labels)
}

fn parse_color(id: usize, value: &Value) -> Result<[u8; 3], LabelFileError> {
    let invalid = |message: &str| LabelFileError::InvalidColor {
        id,
        message: message.to_string(),
    };
    let Value::Array(parts) = value else {
        return Err(invalid("expected [r, g, b]"));
    };
    if parts.len() != 3 {
        return Err(invalid("expected three components"));
    }
    let mut rgb = [0_u8; 3];
    for (slot, part) in rgb.iter_mut().zip(parts) {
        let x = part.as_f64().ok_or_else(|| invalid("component is not a number"))?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let clamped = x.round().clamp(0.0, 255.0) as u8;
        *slot = clamped;
    }
    Ok(rgb)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_get_default_colors() {
        let table = parse_labels(r#"{"0": "plane", "1": "hole", "12": "fillet"}"#).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1).unwrap().name, "hole");
        assert_eq!(table.get(1).unwrap().color, [0, 255, 0]);
        assert_eq!(table.get(12).unwrap().color, DEFAULT_COLORS[2]);
        assert!(table.get(2).is_none());
    }

    #[test]
    fn objects_with_colors() {
        let table = parse_labels(
            r#"{"0": {"name": "boss", "color": [10, 300, -4]}, "1": {"name": "pocket"}}"#,
        )
        .unwrap();
        assert_eq!(table.get(0).unwrap().color, [10, 255, 0]);
        assert_eq!(table.get(1).unwrap().color, DEFAULT_COLORS[1]);
    }

    #[test]
    fn parallel_lists() {
        let table =
            parse_labels(r#"{"names": ["a", "b", "c"], "colors": [[1, 2, 3], [4, 5, 6]]}"#).unwrap();
        assert_eq!(table.get(1).unwrap().color, [4, 5, 6]);
        assert_eq!(table.get(2).unwrap().color, DEFAULT_COLORS[2]);
        let names: Vec<_> = table.iter().map(|(_, l)| l.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse_labels("{}"), Err(LabelFileError::Empty)));
        assert!(matches!(parse_labels("[1, 2]"), Err(LabelFileError::Layout(_))));
        assert!(matches!(
            parse_labels(r#"{"zero": "plane"}"#),
            Err(LabelFileError::InvalidId(_))
        ));
        assert!(matches!(
            parse_labels(r#"{"0": {"name": "x", "color": [1, 2]}}"#),
            Err(LabelFileError::InvalidColor { id: 0, .. })
        ));
        assert!(matches!(parse_labels("{"), Err(LabelFileError::Json(_))));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"0": "plane"}"#).unwrap();
        assert_eq!(load_labels(&path).unwrap().len(), 1);
        let missing = load_labels(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, LabelFileError::Io { .. }));
    }

    #[test]
    fn numbered_table() {
        let table = LabelTable::numbered(3);
        assert_eq!(table.get(2).unwrap().name, "class_2");
    }
}

//! Field and transition plans.
//!
//! A schema's JSON bindings are flattened into one entry per path, ordered so
//! that entries sharing a parent are adjacent, and the nesting between each
//! pair of neighbours is precomputed as open/close events. Writing a row then
//! replays the events without building a tree.

use std::collections::HashMap;

use elr_model::Schema;

use crate::error::{RedoxError, Result};

/// Constant fields every object carries.
pub const META_DATA_MODEL: (&str, &str) = ("Meta.DataModel", "Results");
pub const META_EVENT_TYPE: (&str, &str) = ("Meta.EventType", "NewUnsolicited");
pub const META_EVENT_DATE_TIME: &str = "Meta.EventDateTime";

/// One step of a dotted path: `Name`, or `Name[]` / `Name[i]` for an object
/// inside an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub name: String,
    /// Array position; `Name[]` is position zero.
    pub index: Option<usize>,
}

impl PathSegment {
    fn parse(part: &str) -> std::result::Result<Self, String> {
        let part = part.trim();
        let (name, index) = match part.split_once('[') {
            None => (part, None),
            Some((name, rest)) => {
                let inner = rest
                    .strip_suffix(']')
                    .ok_or_else(|| format!("unclosed array segment '{part}'"))?;
                let index = match inner.trim() {
                    "" => 0,
                    digits => digits
                        .parse()
                        .map_err(|_| format!("bad array index in '{part}'"))?,
                };
                (name.trim(), Some(index))
            }
        };
        if name.is_empty() {
            return Err(format!("empty segment in '{part}'"));
        }
        Ok(Self {
            name: name.to_string(),
            index,
        })
    }

    fn is_array(&self) -> bool {
        self.index.is_some()
    }

    /// Same array, different position.
    fn is_sibling_of(&self, other: &Self) -> bool {
        self.is_array() && other.is_array() && self.name == other.name && self.index != other.index
    }
}

/// Where a field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Index of the element in the schema.
    Element(usize),
    Constant(&'static str),
    /// The time the object is written.
    CurrentTime,
}

/// One JSON leaf to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedField {
    pub path: String,
    pub parents: Vec<PathSegment>,
    pub leaf: String,
    pub source: FieldSource,
}

impl PlannedField {
    fn parse(path: &str, source: FieldSource, element: &str) -> Result<Self> {
        let invalid = |reason: String| RedoxError::InvalidPath {
            path: path.to_string(),
            element: element.to_string(),
            reason,
        };
        let mut segments = path
            .split('.')
            .map(PathSegment::parse)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(invalid)?;
        let leaf = match segments.pop() {
            Some(PathSegment { name, index: None }) => name,
            Some(_) => return Err(invalid("the last segment cannot be an array".to_string())),
            None => return Err(invalid("empty path".to_string())),
        };
        Ok(Self {
            path: path.to_string(),
            parents: segments,
            leaf,
            source,
        })
    }
}

/// Structural event replayed before a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Open an object; named unless it is an array element.
    StartObject(Option<String>),
    StartArray(String),
    EndObject,
    EndArray,
}

/// Flatten `schema` into its JSON fields plus the constant metadata fields,
/// grouped so that fields under the same parent are adjacent.
///
/// Groups keep the order in which their parent first appears; within a
/// group, fields keep schema order.
pub fn field_plan(schema: &Schema) -> Result<Vec<PlannedField>> {
    let mut fields = vec![
        PlannedField::parse(META_DATA_MODEL.0, FieldSource::Constant(META_DATA_MODEL.1), "")?,
        PlannedField::parse(META_EVENT_TYPE.0, FieldSource::Constant(META_EVENT_TYPE.1), "")?,
        PlannedField::parse(META_EVENT_DATE_TIME, FieldSource::CurrentTime, "")?,
    ];
    for (index, element) in schema.elements().iter().enumerate() {
        for path in &element.redox_output_fields {
            fields.push(PlannedField::parse(path, FieldSource::Element(index), &element.name)?);
        }
    }

    // Rank each parent prefix, and each array by name, by first appearance.
    let mut first_seen: HashMap<(Vec<PathSegment>, bool), usize> = HashMap::new();
    for (position, field) in fields.iter().enumerate() {
        for depth in 0..field.parents.len() {
            for key in prefix_keys(&field.parents, depth) {
                first_seen.entry(key).or_insert(position);
            }
        }
    }
    let sort_key = |field: &PlannedField| -> Vec<usize> {
        (0..field.parents.len())
            .flat_map(|depth| prefix_keys(&field.parents, depth))
            .map(|key| first_seen.get(&key).copied().unwrap_or_default())
            .collect()
    };
    fields.sort_by_cached_key(sort_key);
    Ok(fields)
}

/// The prefix ending at `depth` with its last index dropped, then in full.
/// Ranking both keeps every position of one array together.
fn prefix_keys(parents: &[PathSegment], depth: usize) -> [(Vec<PathSegment>, bool); 2] {
    let full = parents[..=depth].to_vec();
    let mut by_name = full.clone();
    if let Some(last) = by_name.last_mut() {
        last.index = None;
    }
    [(by_name, false), (full, true)]
}

/// Events before each field of `fields`, plus a final entry closing
/// everything still open. The result has `fields.len() + 1` entries.
pub fn transition_plan(fields: &[PlannedField]) -> Vec<Vec<Transition>> {
    let mut plan = Vec::with_capacity(fields.len() + 1);
    let mut previous: &[PathSegment] = &[];
    for field in fields {
        plan.push(transitions(previous, &field.parents));
        previous = &field.parents;
    }
    plan.push(transitions(previous, &[]));
    plan
}

fn transitions(from: &[PathSegment], to: &[PathSegment]) -> Vec<Transition> {
    let common = from.iter().zip(to).take_while(|(a, b)| a == b).count();
    let sibling = matches!(
        (from.get(common), to.get(common)),
        (Some(a), Some(b)) if a.is_sibling_of(b)
    );

    let mut events = Vec::new();
    for (depth, segment) in from.iter().enumerate().skip(common).rev() {
        events.push(Transition::EndObject);
        if segment.is_array() && !(sibling && depth == common) {
            events.push(Transition::EndArray);
        }
    }
    for (depth, segment) in to.iter().enumerate().skip(common) {
        if segment.is_array() {
            if !(sibling && depth == common) {
                events.push(Transition::StartArray(segment.name.clone()));
            }
            events.push(Transition::StartObject(None));
        } else {
            events.push(Transition::StartObject(Some(segment.name.clone())));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &str) -> PlannedField {
        PlannedField::parse(path, FieldSource::Constant("x"), "e").expect("path")
    }

    fn open(name: &str) -> Transition {
        Transition::StartObject(Some(name.to_string()))
    }

    #[test]
    fn test_parse_segments() {
        let field = field("Orders[].Results[2].Value");
        assert_eq!(field.leaf, "Value");
        assert_eq!(field.parents[0].index, Some(0));
        assert_eq!(field.parents[1].name, "Results");
        assert_eq!(field.parents[1].index, Some(2));
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["", "A..B", "A[x].B", "A[1.B", "A.B[]"] {
            assert!(
                PlannedField::parse(path, FieldSource::Constant("x"), "e").is_err(),
                "{path}"
            );
        }
    }

    #[test]
    fn test_shared_parent_transitions() {
        let plan = transition_plan(&[
            field("Patient.Name"),
            field("Patient.DOB"),
            field("Order.Id"),
        ]);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0], vec![open("Patient")]);
        assert!(plan[1].is_empty());
        assert_eq!(plan[2], vec![Transition::EndObject, open("Order")]);
        assert_eq!(plan[3], vec![Transition::EndObject]);
    }

    #[test]
    fn test_array_transitions() {
        let plan = transition_plan(&[
            field("Orders[0].Id"),
            field("Orders[1].Id"),
            field("Visit.Id"),
        ]);
        assert_eq!(
            plan[0],
            vec![
                Transition::StartArray("Orders".to_string()),
                Transition::StartObject(None)
            ]
        );
        assert_eq!(
            plan[1],
            vec![Transition::EndObject, Transition::StartObject(None)]
        );
        assert_eq!(
            plan[2],
            vec![Transition::EndObject, Transition::EndArray, open("Visit")]
        );
    }

    #[test]
    fn test_deep_close_before_sibling() {
        let plan = transition_plan(&[field("Orders[0].Provider.Name"), field("Orders[1].Id")]);
        assert_eq!(
            plan[1],
            vec![
                Transition::EndObject,
                Transition::EndObject,
                Transition::StartObject(None)
            ]
        );
    }
}

//! In-memory HL7 message: segments, fields, repetitions, components and
//! subcomponents.

use crate::encoding::{Delimiters, SEGMENT_DELIMITER};
use crate::error::Hl7ParseError;
use crate::path::Hl7Path;

/// Component -> subcomponents.
type Components = Vec<Vec<String>>;

/// Segment order of an ORU^R01 message. Unlisted segments sort last.
const SEGMENT_ORDER: &[&str] = &["MSH", "SFT", "PID", "ORC", "OBR", "NTE", "OBX", "SPM"];

fn segment_rank(name: &str) -> usize {
    SEGMENT_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(SEGMENT_ORDER.len())
}

/// One segment. `fields[0]` is field 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    name: String,
    /// Field -> repetition -> component -> subcomponent.
    fields: Vec<Vec<Components>>,
}

impl Segment {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    fn header(delimiters: &Delimiters) -> Self {
        Self {
            name: "MSH".to_string(),
            fields: vec![
                vec![vec![vec![delimiters.field.to_string()]]],
                vec![vec![vec![delimiters.encoding_characters()]]],
            ],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_header(&self) -> bool {
        self.name == "MSH"
    }

    /// Value at one-based `field`/`component`/`subcomponent` of repetition `rep`.
    pub fn get(&self, field: usize, rep: usize, component: usize, subcomponent: usize) -> &str {
        self.fields
            .get(field.wrapping_sub(1))
            .and_then(|reps| reps.get(rep))
            .and_then(|components| components.get(component.wrapping_sub(1)))
            .and_then(|subs| subs.get(subcomponent.wrapping_sub(1)))
            .map_or("", String::as_str)
    }

    /// Number of repetitions present in `field`.
    pub fn repetitions(&self, field: usize) -> usize {
        self.fields.get(field.wrapping_sub(1)).map_or(0, Vec::len)
    }

    fn set(&mut self, field: usize, rep: usize, component: usize, subcomponent: usize, value: String) {
        // MSH-1 and MSH-2 hold the delimiters.
        if self.is_header() && field <= 2 {
            return;
        }
        let reps = grow(&mut self.fields, field - 1);
        let components = grow(reps, rep);
        let subs = grow(components, component - 1);
        *grow(subs, subcomponent - 1) = value;
    }

    fn parse(line: &str, delimiters: &Delimiters) -> Self {
        let mut segment = if line.starts_with("MSH") {
            Self::header(delimiters)
        } else {
            Self::new(&line[..3])
        };
        let body = line.get(4..).unwrap_or("");
        let mut fields = body.split(delimiters.field);
        if segment.is_header() {
            // Encoding characters are stored verbatim.
            fields.next();
        }
        for field in fields {
            let reps = field
                .split(delimiters.repetition)
                .map(|rep| {
                    rep.split(delimiters.component)
                        .map(|component| {
                            component
                                .split(delimiters.subcomponent)
                                .map(|sub| delimiters.unescape(sub))
                                .collect()
                        })
                        .collect()
                })
                .collect();
            segment.fields.push(reps);
        }
        segment
    }

    fn encode(&self, delimiters: &Delimiters, out: &mut String) {
        out.push_str(&self.name);
        let skip = if self.is_header() {
            out.push(delimiters.field);
            out.push_str(&delimiters.encoding_characters());
            2
        } else {
            0
        };
        let encoded: Vec<String> = self
            .fields
            .iter()
            .skip(skip)
            .map(|reps| encode_field(reps, delimiters))
            .collect();
        let used = encoded.iter().rposition(|field| !field.is_empty()).map_or(0, |i| i + 1);
        for field in &encoded[..used] {
            out.push(delimiters.field);
            out.push_str(field);
        }
        out.push(SEGMENT_DELIMITER);
    }
}

fn encode_field(reps: &[Components], delimiters: &Delimiters) -> String {
    let encode_component = |subs: &Vec<String>| {
        join_trimmed(
            subs.iter().map(|sub| delimiters.escape(sub)),
            delimiters.subcomponent,
        )
    };
    let encode_rep = |components: &Components| {
        join_trimmed(components.iter().map(&encode_component), delimiters.component)
    };
    join_trimmed(reps.iter().map(encode_rep), delimiters.repetition)
}

fn grow<T: Default>(items: &mut Vec<T>, index: usize) -> &mut T {
    if items.len() <= index {
        items.resize_with(index + 1, T::default);
    }
    &mut items[index]
}

/// Join with `separator`, dropping trailing empty parts.
fn join_trimmed(parts: impl Iterator<Item = String>, separator: char) -> String {
    let parts: Vec<String> = parts.collect();
    let used = parts.iter().rposition(|part| !part.is_empty()).map_or(0, |i| i + 1);
    let mut out = String::new();
    for (index, part) in parts[..used].iter().enumerate() {
        if index > 0 {
            out.push(separator);
        }
        out.push_str(part);
    }
    out
}

/// An HL7 v2 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    delimiters: Delimiters,
    segments: Vec<Segment>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// A message holding only an MSH segment with the standard delimiters.
    pub fn new() -> Self {
        let delimiters = Delimiters::default();
        Self {
            segments: vec![Segment::header(&delimiters)],
            delimiters,
        }
    }

    /// Parse one message. `\r\n` and `\n` are accepted as segment terminators.
    pub fn parse(text: &str) -> Result<Self, Hl7ParseError> {
        let text = text.replace("\r\n", "\r").replace('\n', "\r");
        let lines: Vec<&str> = text
            .split(SEGMENT_DELIMITER)
            .filter(|line| !line.trim().is_empty())
            .collect();
        let first = lines.first().ok_or(Hl7ParseError::EmptyMessage)?;
        let delimiters = Delimiters::from_header(first).ok_or(Hl7ParseError::NotAMessage)?;

        let mut segments = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            let name_ok = line.get(..3).is_some_and(|name| {
                name.chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            });
            let separated = line
                .get(3..)
                .is_some_and(|rest| rest.chars().next().is_none_or(|c| c == delimiters.field));
            if !name_ok || !separated {
                return Err(Hl7ParseError::MalformedSegment {
                    line: index + 1,
                    segment: (*line).to_string(),
                });
            }
            segments.push(Segment::parse(line, &delimiters));
        }
        Ok(Self {
            delimiters,
            segments,
        })
    }

    /// Encode with a carriage return after every segment.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            segment.encode(&self.delimiters, &mut out);
        }
        out
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments named `name`, in message order.
    pub fn segments_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Segment> + use<'a, 'n> {
        self.segments.iter().filter(move |segment| segment.name == name)
    }

    pub fn segment_count(&self, name: &str) -> usize {
        self.segments_named(name).count()
    }

    /// Repetition `rep` (zero-based) of segment `name`.
    pub fn segment(&self, name: &str, rep: usize) -> Option<&Segment> {
        self.segments_named(name).nth(rep)
    }

    /// Value at `path`, or `""` when absent.
    pub fn get(&self, path: &Hl7Path) -> &str {
        self.segment(&path.segment, path.segment_rep)
            .map_or("", |segment| {
                segment.get(
                    path.field,
                    path.field_rep,
                    path.component_number(),
                    path.subcomponent_number(),
                )
            })
    }

    /// Set the value at `path`, creating segments as needed in ORU^R01 order.
    ///
    /// Clearing a location in a segment that does not exist is a no-op.
    pub fn set(&mut self, path: &Hl7Path, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() && self.segment(&path.segment, path.segment_rep).is_none() {
            return;
        }
        let segment = self.segment_mut(&path.segment, path.segment_rep);
        segment.set(
            path.field,
            path.field_rep,
            path.component_number(),
            path.subcomponent_number(),
            value,
        );
    }

    fn segment_mut(&mut self, name: &str, rep: usize) -> &mut Segment {
        let existing = self.segment_count(name);
        for _ in existing..=rep {
            let rank = segment_rank(name);
            let position = self
                .segments
                .iter()
                .rposition(|segment| segment_rank(&segment.name) <= rank)
                .map_or(0, |i| i + 1);
            self.segments.insert(position, Segment::new(name));
        }
        let index = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.name == name)
            .nth(rep)
            .map_or(0, |(index, _)| index);
        &mut self.segments[index]
    }
}

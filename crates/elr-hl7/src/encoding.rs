//! Delimiters and escape sequences.

/// Segment terminator on the wire.
pub const SEGMENT_DELIMITER: char = '\r';

/// The five HL7 delimiter characters of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Read delimiters from the start of an MSH segment (`MSH|^~\&`).
    pub fn from_header(segment: &str) -> Option<Self> {
        let mut chars = segment.strip_prefix("MSH")?.chars();
        let field = chars.next()?;
        let encoding: Vec<char> = chars.take_while(|c| *c != field).collect();
        match encoding.as_slice() {
            [component, repetition, escape, subcomponent] => Some(Self {
                field,
                component: *component,
                repetition: *repetition,
                escape: *escape,
                subcomponent: *subcomponent,
            }),
            _ => None,
        }
    }

    /// MSH-2 text.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    pub fn escape(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            let code = match c {
                c if c == self.field => Some('F'),
                c if c == self.component => Some('S'),
                c if c == self.repetition => Some('R'),
                c if c == self.escape => Some('E'),
                c if c == self.subcomponent => Some('T'),
                _ => None,
            };
            match code {
                Some(code) => {
                    out.push(self.escape);
                    out.push(code);
                    out.push(self.escape);
                }
                None => out.push(c),
            }
        }
        out
    }

    /// Reverse [`escape`](Self::escape). Unknown sequences are kept verbatim.
    pub fn unescape(&self, value: &str) -> String {
        if !value.contains(self.escape) {
            return value.to_string();
        }
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find(self.escape) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.escape.len_utf8()..];
            let Some(end) = after.find(self.escape) else {
                out.push_str(&rest[start..]);
                return out;
            };
            let replacement = match &after[..end] {
                "F" => Some(self.field),
                "S" => Some(self.component),
                "R" => Some(self.repetition),
                "E" => Some(self.escape),
                "T" => Some(self.subcomponent),
                _ => None,
            };
            let consumed = start + self.escape.len_utf8() * 2 + end;
            match replacement {
                Some(c) => out.push(c),
                None => out.push_str(&rest[start..consumed]),
            }
            rest = &rest[consumed..];
        }
        out.push_str(rest);
        out
    }
}

//! Streaming JSON writer driven by plan transitions.

use serde_json::Value;
use serde_json::ser::{CompactFormatter, Formatter};

use crate::error::Result;
use crate::plan::Transition;

/// An open container and whether it has a member yet.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { first: bool },
    Array { first: bool },
}

/// Writes one JSON object into a buffer through serde_json's compact formatter.
#[derive(Debug)]
pub(crate) struct JsonWriter {
    out: Vec<u8>,
    formatter: CompactFormatter,
    frames: Vec<Frame>,
}

impl JsonWriter {
    pub(crate) fn new() -> Self {
        Self {
            out: Vec::new(),
            formatter: CompactFormatter,
            frames: Vec::new(),
        }
    }

    /// Take the innermost container's `first` flag and mark it as used.
    fn take_first(&mut self) -> Option<Frame> {
        let frame = self.frames.last_mut()?;
        let current = *frame;
        match frame {
            Frame::Object { first } | Frame::Array { first } => *first = false,
        }
        Some(current)
    }

    /// Open a member: a key inside an object, a slot inside an array.
    fn begin_member(&mut self, name: Option<&str>) -> Result<()> {
        match (self.take_first(), name) {
            (Some(Frame::Object { first }), Some(name)) => {
                self.formatter.begin_object_key(&mut self.out, first)?;
                serde_json::to_writer(&mut self.out, name)?;
                self.formatter.end_object_key(&mut self.out)?;
                self.formatter.begin_object_value(&mut self.out)?;
            }
            (Some(Frame::Array { first }), _) => {
                self.formatter.begin_array_value(&mut self.out, first)?;
            }
            // Root, or an anonymous member of an object which the plan never emits.
            _ => {}
        }
        Ok(())
    }

    fn end_member(&mut self) -> Result<()> {
        match self.frames.last() {
            Some(Frame::Object { .. }) => self.formatter.end_object_value(&mut self.out)?,
            Some(Frame::Array { .. }) => self.formatter.end_array_value(&mut self.out)?,
            None => {}
        }
        Ok(())
    }

    pub(crate) fn start_object(&mut self, name: Option<&str>) -> Result<()> {
        self.begin_member(name)?;
        self.formatter.begin_object(&mut self.out)?;
        self.frames.push(Frame::Object { first: true });
        Ok(())
    }

    pub(crate) fn start_array(&mut self, name: &str) -> Result<()> {
        self.begin_member(Some(name))?;
        self.formatter.begin_array(&mut self.out)?;
        self.frames.push(Frame::Array { first: true });
        Ok(())
    }

    pub(crate) fn end_object(&mut self) -> Result<()> {
        self.frames.pop();
        self.formatter.end_object(&mut self.out)?;
        self.end_member()
    }

    pub(crate) fn end_array(&mut self) -> Result<()> {
        self.frames.pop();
        self.formatter.end_array(&mut self.out)?;
        self.end_member()
    }

    pub(crate) fn apply(&mut self, transition: &Transition) -> Result<()> {
        match transition {
            Transition::StartObject(name) => self.start_object(name.as_deref()),
            Transition::StartArray(name) => self.start_array(name),
            Transition::EndObject => self.end_object(),
            Transition::EndArray => self.end_array(),
        }
    }

    pub(crate) fn field(&mut self, name: &str, value: &Value) -> Result<()> {
        self.begin_member(Some(name))?;
        serde_json::to_writer(&mut self.out, value)?;
        self.end_member()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

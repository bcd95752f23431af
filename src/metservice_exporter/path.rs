// metservice_exporter - Prometheus metrics exporter for MetService NZ
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A single segment of a [`KeyPath`].
///
/// Segments made only of ASCII digits can also address array elements. The
/// original text is kept since permissive resolution compares it against
/// object keys as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    name: String,
    index: Option<usize>,
}

impl Segment {
    fn new(name: &str) -> Self {
        let index = if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            name.parse().ok()
        } else {
            None
        };

        Segment {
            name: name.to_owned(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// Path of field names and array offsets built from a `.` delimited string.
///
/// An empty string is the empty path which always resolves to the document
/// it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return KeyPath::default();
        }

        KeyPath {
            segments: path.split('.').map(Segment::new).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for KeyPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyPath::parse(s))
    }
}

impl From<&str> for KeyPath {
    fn from(s: &str) -> Self {
        KeyPath::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
        }

        Ok(())
    }
}

/// How a [`KeyPath`] is matched against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveMode {
    /// Search the whole document in order, letting each segment match at any
    /// depth. The first non-null match wins.
    Permissive,
    /// Consume exactly one segment per level, no searching.
    Strict,
}

impl ResolveMode {
    /// Resolve `path` against `doc`, returning `None` when nothing matches.
    ///
    /// This never fails: a missing key, out of range index, or scalar in the
    /// middle of the path is simply absent.
    pub fn resolve<'a>(self, doc: &'a Value, path: &KeyPath) -> Option<&'a Value> {
        match self {
            Self::Permissive => resolve_permissive(doc, path.segments()),
            Self::Strict => resolve_strict(doc, path.segments()),
        }
    }
}

/// Depth-first search for `path` anywhere below `doc`.
///
/// When the head of the path matches a key (or an array offset) the search
/// continues into that value with the rest of the path. Otherwise the value is
/// searched with the path unchanged. Matches that are JSON `null` are skipped
/// so that a later, populated match can be found instead.
pub fn resolve_permissive<'a>(doc: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    let (head, tail) = match path.split_first() {
        Some(parts) => parts,
        None => return Some(doc),
    };

    match doc {
        Value::Array(items) => items.iter().enumerate().find_map(|(i, item)| {
            if head.index == Some(i) {
                search(item, tail)
            } else {
                search(item, path)
            }
        }),
        Value::Object(map) => map.iter().find_map(|(key, value)| {
            if key == &head.name {
                search(value, tail)
            } else {
                search(value, path)
            }
        }),
        _ => None,
    }
}

fn search<'a>(doc: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    resolve_permissive(doc, path).filter(|v| !v.is_null())
}

/// Index `doc` one segment at a time.
///
/// Digit segments only index arrays and other segments only index objects.
pub fn resolve_strict<'a>(doc: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |node, segment| match node {
        Value::Object(map) if segment.index.is_none() => map.get(&segment.name),
        Value::Array(items) => segment.index.and_then(|i| items.get(i)),
        _ => None,
    })
}

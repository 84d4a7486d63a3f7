//! Dot-separated paths addressing locations inside a value graph.
//!
//! Syntax: `user.tags[2].name` — identifiers separated by dots, with `[n]`
//! index subscripts for list elements. Parsing and display round-trip.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::InvalidConstraintError;

/// One element of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A map key.
    Key(String),
    /// A list index.
    Index(usize),
}

/// A parsed location inside a value graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The segments making up this path, in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true when the path has no segments (addresses the graph root).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The leading map key of this path, if it starts with one.
    #[must_use]
    pub fn root_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(key)) => Some(key),
            _ => None,
        }
    }
}

impl FromStr for Path {
    type Err = InvalidConstraintError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        if path.is_empty() {
            return Ok(Path::default());
        }

        let mut segments = Vec::new();
        for raw in path.split('.') {
            let (name, subscripts) = split_name_and_subscripts(raw)?;
            if name.is_empty() && subscripts.is_empty() {
                return Err(InvalidConstraintError {
                    cause: format!("empty segment in path `{path}`"),
                });
            }
            if !name.is_empty() {
                if !is_identifier(&name) {
                    return Err(InvalidConstraintError {
                        cause: format!("invalid segment `{name}` in path `{path}`"),
                    });
                }
                segments.push(Segment::Key(name));
            } else if segments.is_empty() {
                return Err(InvalidConstraintError {
                    cause: format!("path `{path}` may not start with a subscript"),
                });
            }
            segments.extend(subscripts.into_iter().map(Segment::Index));
        }

        Ok(Path { segments })
    }
}

fn split_name_and_subscripts(segment: &str) -> Result<(String, Vec<usize>), InvalidConstraintError> {
    let name_end = segment.find('[').unwrap_or(segment.len());
    let name = segment[..name_end].to_string();
    let mut subscripts = Vec::new();
    let mut rest = &segment[name_end..];

    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.split_once(']'))
            .ok_or_else(|| InvalidConstraintError {
                cause: format!("malformed subscript in segment `{segment}`"),
            })?;
        let (token, tail) = inner;
        let index = token.parse::<usize>().map_err(|_| InvalidConstraintError {
            cause: format!("non-numeric subscript `{token}` in segment `{segment}`"),
        })?;
        subscripts.push(index);
        rest = tail;
    }

    Ok((name, subscripts))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use pretty_assertions::assert_eq;
    use proptest::collection::vec;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_keys_and_subscripts() {
        let path: Path = "user.tags[2].name".parse().expect("path must parse");
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("user".to_string()),
                Segment::Key("tags".to_string()),
                Segment::Index(2),
                Segment::Key("name".to_string()),
            ]
        );
        assert_eq!(path.root_key(), Some("user"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!("user..name".parse::<Path>().is_err());
        assert!("user.tags[x]".parse::<Path>().is_err());
        assert!("user.tags[1".parse::<Path>().is_err());
        assert!("[0].user".parse::<Path>().is_err());
        assert!("user.1name".parse::<Path>().is_err());
    }

    #[test]
    fn empty_path_addresses_the_root() {
        let path: Path = "".parse().expect("empty path is the root");
        assert!(path.is_root());
        assert_eq!(path.to_string(), "");
    }

    proptest! {
        #[test]
        fn dotted_paths_round_trip_through_parser(
            segments in vec("[a-zA-Z_][a-zA-Z0-9_]{0,8}", 1..6)
        ) {
            let path = segments.join(".");
            let parsed: Path = path.parse().expect("generated path must parse");
            prop_assert_eq!(parsed.to_string(), path);
        }

        #[test]
        fn indexed_paths_round_trip_through_parser(
            name in "[a-zA-Z_][a-zA-Z0-9_]{0,8}",
            indexes in vec(0_usize..1000, 1..4)
        ) {
            let mut path = name;
            for index in &indexes {
                let _ = write!(path, "[{index}]");
            }
            let parsed: Path = path.parse().expect("generated path must parse");
            prop_assert_eq!(parsed.to_string(), path);
        }
    }
}

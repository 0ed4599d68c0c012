use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Formatting attributes attached to a run of text (`bold`, `header`, ...).
pub type Attributes = Map<String, Value>;

/// One step of a [`Delta`].
///
/// Serialized in the rich-text editor's JSON shape: `{"insert": "hi"}`,
/// `{"retain": 3, "attributes": {"bold": true}}`, `{"delete": 2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    Insert {
        insert: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attributes: Option<Attributes>,
    },
    Delete {
        delete: usize,
    },
}

impl Op {
    pub fn insert(text: impl Into<String>) -> Self {
        Op::Insert {
            insert: text.into(),
            attributes: None,
        }
    }

    pub fn retain(count: usize) -> Self {
        Op::Retain {
            retain: count,
            attributes: None,
        }
    }

    pub fn delete(count: usize) -> Self {
        Op::Delete { delete: count }
    }

    /// Length in characters (Unicode scalar values).
    pub fn len(&self) -> usize {
        match self {
            Op::Insert { insert, .. } => insert.chars().count(),
            Op::Retain { retain, .. } => *retain,
            Op::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An ordered list of content mutations, or, when it holds only inserts,
/// the content of a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub ops: Vec<Op>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, text: impl Into<String>) -> Self {
        self.push(Op::insert(text));
        self
    }

    pub fn insert_with(mut self, text: impl Into<String>, attributes: Attributes) -> Self {
        self.push(Op::Insert {
            insert: text.into(),
            attributes: Some(attributes),
        });
        self
    }

    pub fn retain(mut self, count: usize) -> Self {
        self.push(Op::retain(count));
        self
    }

    pub fn retain_with(mut self, count: usize, attributes: Attributes) -> Self {
        self.push(Op::Retain {
            retain: count,
            attributes: Some(attributes),
        });
        self
    }

    pub fn delete(mut self, count: usize) -> Self {
        self.push(Op::delete(count));
        self
    }

    /// Appends an op, merging it into the previous one when both are of the
    /// same kind and carry the same attributes. Empty ops are dropped.
    pub fn push(&mut self, op: Op) {
        if op.is_empty() {
            return;
        }

        if let Some(last) = self.ops.last_mut() {
            match (last, &op) {
                (
                    Op::Insert {
                        insert: last,
                        attributes: last_attrs,
                    },
                    Op::Insert { insert, attributes },
                ) if *last_attrs == *attributes => {
                    last.push_str(insert);
                    return;
                }
                (
                    Op::Retain {
                        retain: last,
                        attributes: last_attrs,
                    },
                    Op::Retain { retain, attributes },
                ) if *last_attrs == *attributes => {
                    *last += retain;
                    return;
                }
                (Op::Delete { delete: last }, Op::Delete { delete }) => {
                    *last += delete;
                    return;
                }
                _ => {}
            }
        }

        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True when every op is an insert, i.e. the delta describes content.
    pub fn is_document(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, Op::Insert { .. }))
    }

    /// Number of characters of content (inserted text).
    pub fn text_len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Insert { .. }))
            .map(Op::len)
            .sum()
    }

    pub fn plain_text(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Insert { insert, .. } => Some(insert.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Applies `edit` to this content and returns the new content.
    ///
    /// Retains and deletes that run past the end of the content are clamped.
    /// There is no position reconciliation: concurrent edits land wherever
    /// their offsets point at the time they are applied.
    pub fn apply(&self, edit: &Delta) -> Delta {
        let mut cursor = ContentCursor::new(&self.ops);
        let mut out = Delta::new();

        for op in &edit.ops {
            match op {
                Op::Insert { insert, attributes } => out.push(Op::Insert {
                    insert: insert.clone(),
                    attributes: merge_attributes(None, attributes.as_ref()),
                }),
                Op::Retain { retain, attributes } => {
                    for (text, base) in cursor.take(*retain) {
                        out.push(Op::Insert {
                            insert: text.to_owned(),
                            attributes: merge_attributes(base, attributes.as_ref()),
                        });
                    }
                }
                Op::Delete { delete } => {
                    cursor.take(*delete);
                }
            }
        }

        for (text, attributes) in cursor.take(usize::MAX) {
            out.push(Op::Insert {
                insert: text.to_owned(),
                attributes: attributes.cloned(),
            });
        }

        out
    }

    /// Canonical content form: inserts only, adjacent runs merged.
    pub fn normalized(&self) -> Delta {
        Delta::new().apply(self)
    }
}

fn merge_attributes(base: Option<&Attributes>, patch: Option<&Attributes>) -> Option<Attributes> {
    let mut merged = base.cloned().unwrap_or_default();
    if let Some(patch) = patch {
        for (key, value) in patch {
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    (!merged.is_empty()).then_some(merged)
}

fn split_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, ""),
    }
}

/// Walks the inserted text of a content delta in character units.
struct ContentCursor<'a> {
    ops: &'a [Op],
    index: usize,
    offset: usize,
}

impl<'a> ContentCursor<'a> {
    fn new(ops: &'a [Op]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    fn advance(&mut self) {
        self.index += 1;
        self.offset = 0;
    }

    fn take(&mut self, mut count: usize) -> Vec<(&'a str, Option<&'a Attributes>)> {
        let mut pieces = Vec::new();

        while count > 0 {
            let Some(op) = self.ops.get(self.index) else {
                break;
            };
            let Op::Insert { insert, attributes } = op else {
                self.advance();
                continue;
            };

            let (_, rest) = split_chars(insert, self.offset);
            let available = rest.chars().count();
            if available == 0 {
                self.advance();
                continue;
            }

            let taken = count.min(available);
            let (piece, _) = split_chars(rest, taken);
            pieces.push((piece, attributes.as_ref()));
            count -= taken;

            if taken == available {
                self.advance();
            } else {
                self.offset += taken;
            }
        }

        pieces
    }
}

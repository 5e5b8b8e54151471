//! Line tokenizer for the command shell.
//!
//! Splits one lower-cased input line into typed fields. A field starts at
//! the first non-delimiter character after the start of line or a delimiter
//! run; its kind is fixed by that first character and does not change even
//! if the rest of the field mixes letters and digits (`1a` stays numeric).
//! Anything that is neither an ASCII letter nor a digit/`.`/`-` delimits.

/// Default field capacity per line.
pub const MAX_FIELDS: usize = 5;

/// Classification of a field by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Starts with an ASCII letter.
    Alpha,
    /// Starts with a digit, `.` or `-`.
    Numeric,
}

/// One field: where it starts in the line, and its kind.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub start: usize,
    pub kind: FieldKind,
}

/// Ordered field sequence for one input line, bounded by `MAX`.
///
/// Input with more than `MAX` fields is truncated, not rejected.
#[derive(Debug, Clone, Copy)]
pub struct FieldSet<const MAX: usize = MAX_FIELDS> {
    fields: [Field; MAX],
    len: usize,
}

impl<const MAX: usize> FieldSet<MAX> {
    pub const fn empty() -> Self {
        Self {
            fields: [Field {
                start: 0,
                kind: FieldKind::Alpha,
            }; MAX],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<Field> {
        (index < self.len).then(|| self.fields[index])
    }

    pub fn kind(
        &self,
        index: usize,
    ) -> Option<FieldKind> {
        self.get(index).map(|f| f.kind)
    }

    /// Text of field `index`: from its start offset up to the next
    /// delimiter or end of line.
    pub fn text<'l>(
        &self,
        line: &'l str,
        index: usize,
    ) -> Option<&'l str> {
        let field = self.get(index)?;
        let rest = &line[field.start..];
        let end = rest
            .bytes()
            .position(is_delimiter)
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

fn is_alpha(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_numeric(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.' || b == b'-'
}

fn is_delimiter(b: u8) -> bool {
    !is_alpha(b) && !is_numeric(b)
}

/// Scan `line` into a bounded field sequence.
///
/// Pure and idempotent; the same line always produces the same fields.
pub fn tokenize<const MAX: usize>(line: &str) -> FieldSet<MAX> {
    let mut set = FieldSet::empty();
    let mut in_field = false;

    for (i, b) in line.bytes().enumerate() {
        if is_delimiter(b) {
            in_field = false;
        } else if !in_field {
            in_field = true;
            if set.len < MAX {
                set.fields[set.len] = Field {
                    start: i,
                    kind: if is_alpha(b) {
                        FieldKind::Alpha
                    } else {
                        FieldKind::Numeric
                    },
                };
                set.len += 1;
            }
        }
    }
    set
}

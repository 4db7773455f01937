use std::collections::{BTreeSet, HashMap};
use std::fmt::Write;

use unicode_width::UnicodeWidthStr;

use crate::{DataPack, Entry, EntryId, PackResult, Span};

/// Convert a zero-based index to a base-26 label: A, B, ..., Z, AA, AB, ..., AZ, BA, ...
fn index_to_base26_label(mut n: usize) -> String {
    let mut result = String::new();
    loop {
        let remainder = n % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// `Type { field: value, .. }` with null fields left out.
fn describe(entry: &Entry) -> String {
    let mut out = entry.type_name().to_string();
    let mut fields = entry.fields().filter(|(_, value)| !value.is_null()).peekable();
    if fields.peek().is_some() {
        out.push_str(" { ");
        let rendered: Vec<String> = fields
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect();
        out.push_str(&rendered.join(", "));
        out.push_str(" }");
    }
    out
}

struct IncludedSpan {
    id: EntryId,
    span: Span,
    description: String,
}

struct IncludedLink {
    label: String,
    parent: EntryId,
    child: EntryId,
}

/// Renders a pack's text with one underline per included annotation and an
/// arrow under each included link's parent, pointing at its child.
///
/// ```text
/// Alice sleeps
/// ╰───╯[A] Token
///       ╰────╯Token
///         └─Dependency─>[A]
/// ```
pub struct PackDisplay<'a> {
    pack: &'a DataPack,
    include_spans: Vec<IncludedSpan>,
    include_links: Vec<IncludedLink>,
}

// 0     6      - byte offsets
// Alice sleeps
// ╰───╯[A] Token
//       ╰────╯Token
//         └─Dependency─>[A]
impl<'a> std::fmt::Display for PackDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // newlines and tabs would break the column layout
        let opening_line: String = self
            .pack
            .text()
            .chars()
            .map(|c| if c.is_ascii_control() { ' ' } else { c })
            .collect();
        f.write_str(&opening_line)?;

        // one byte replaced by one byte, so offsets still line up
        let column = |offset: usize| {
            opening_line
                .get(..offset)
                .map_or(0, |prefix| UnicodeWidthStr::width(prefix))
        };
        let span_labels = self.build_span_labels();

        for included in self.include_spans.iter() {
            f.write_char('\n')?;

            let start_char_idx = column(included.span.begin());
            for _ in 0..start_char_idx {
                f.write_char(' ')?;
            }

            f.write_char('╰')?;

            let end_char_idx = column(included.span.end());
            let char_len = end_char_idx.saturating_sub(start_char_idx);
            for _ in (start_char_idx + 1)..end_char_idx.saturating_sub(1) {
                f.write_char('─')?;
            }

            if char_len > 1 {
                f.write_char('╯')?;
            }

            if let Some(label) = span_labels.get(&included.id) {
                write!(f, "{} ", label)?;
            }

            f.write_str(&included.description)?;

            for link in self.include_links.iter().filter(|link| link.parent == included.id) {
                f.write_char('\n')?;

                let arrow_indent = start_char_idx + 2;
                for _ in 0..arrow_indent {
                    f.write_char(' ')?;
                }

                let target_str = match span_labels.get(&link.child) {
                    Some(target_label) => target_label.clone(),
                    None => match self.pack.get_entry(link.child).ok().and_then(Entry::span) {
                        Some(span) => span.to_string(),
                        None => format!("#{}", link.child),
                    },
                };

                write!(f, "└─{}─>{}", link.label, target_str)?;
            }
        }

        Ok(())
    }
}

impl<'a> PackDisplay<'a> {
    pub fn new(pack: &'a DataPack) -> Self {
        PackDisplay {
            pack,
            include_spans: Vec::new(),
            include_links: Vec::new(),
        }
    }

    /// Label every included annotation that an included link points at,
    /// in span order.
    fn build_span_labels(&self) -> HashMap<EntryId, String> {
        let included: HashMap<EntryId, Span> = self
            .include_spans
            .iter()
            .map(|included| (included.id, included.span))
            .collect();

        let targets: BTreeSet<(Span, EntryId)> = self
            .include_links
            .iter()
            .filter(|link| included.contains_key(&link.parent))
            .filter_map(|link| included.get(&link.child).map(|span| (*span, link.child)))
            .collect();

        targets
            .into_iter()
            .enumerate()
            .map(|(i, (_, id))| (id, format!("[{}]", index_to_base26_label(i))))
            .collect()
    }

    /// Include every annotation of `type_name` (or a subtype).
    pub fn include(&mut self, type_name: &str) -> PackResult<()> {
        let pack = self.pack;
        for entry in pack.query_entries(type_name, None)? {
            if let Some(span) = entry.span() {
                self.include_spans.push(IncludedSpan {
                    id: entry.id(),
                    span,
                    description: describe(entry),
                });
            }
        }
        Ok(())
    }

    /// Include every fully set link of `type_name` (or a subtype) as an
    /// arrow from its parent to its child.
    pub fn include_links(&mut self, type_name: &str) -> PackResult<()> {
        let pack = self.pack;
        for entry in pack.query_entries(type_name, None)? {
            if let Some((parent, child)) = entry
                .as_link()
                .and_then(|link| Some((link.parent()?, link.child()?)))
            {
                self.include_links.push(IncludedLink {
                    label: entry.type_name().to_string(),
                    parent,
                    child,
                });
            }
        }
        Ok(())
    }

    /// Takes self
    pub fn with(mut self, type_name: &str) -> PackResult<Self> {
        self.include(type_name)?;
        Ok(self)
    }

    /// Takes self, includes links
    pub fn with_links(mut self, type_name: &str) -> PackResult<Self> {
        self.include_links(type_name)?;
        Ok(self)
    }
}

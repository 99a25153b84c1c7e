//! Bridges document nodes to their styled representations.
//!
//! For every node the browser needs two formats: the full `content` shown
//! while the node is collapsed (`key: value`, or `key: [...]` for a
//! container), and the short `placeholder` shown while it is expanded (the
//! key alone, its children rendered as separate rows). The inner ellipsis of
//! a collapsed container is excluded from the raw stream so searching for
//! dots never hits every collapsed node.

use core_format::Fmt;
use core_style::Palette;

use crate::{DocId, Document, Kind, Scalar};

#[derive(Debug, Clone)]
pub struct Adapter {
    palette: Palette,
}

impl Adapter {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Full representation: what a collapsed node's row(s) show.
    pub fn content(&self, doc: &Document, id: DocId) -> Fmt {
        let mut parts = self.key_prefix(doc, id);
        parts.push(match doc.kind(id) {
            Kind::Array => self.summary("[", "]"),
            Kind::Object => self.summary("{", "}"),
            _ => match doc.scalar(id) {
                Some(s) => self.scalar(s),
                None => Fmt::empty(),
            },
        });
        Fmt::concat(parts)
    }

    /// Shortened representation for an expanded node: just the key.
    pub fn placeholder(&self, doc: &Document, id: DocId) -> Fmt {
        if doc.key(id).is_empty() {
            return Fmt::empty();
        }
        Fmt::concat(vec![
            Fmt::fg(self.palette.key, Fmt::nobreak(Fmt::text(doc.key(id)))),
            Fmt::fg(self.palette.muted, Fmt::text(":")),
        ])
    }

    fn key_prefix(&self, doc: &Document, id: DocId) -> Vec<Fmt> {
        if doc.key(id).is_empty() {
            return Vec::new();
        }
        vec![
            Fmt::fg(self.palette.key, Fmt::nobreak(Fmt::text(doc.key(id)))),
            Fmt::fg(self.palette.muted, Fmt::text(": ")),
        ]
    }

    fn summary(&self, open: &str, close: &str) -> Fmt {
        Fmt::fg(
            self.palette.muted,
            Fmt::concat(vec![
                Fmt::text(open),
                Fmt::exclude(Fmt::text("...")),
                Fmt::text(close),
            ]),
        )
    }

    fn scalar(&self, scalar: &Scalar) -> Fmt {
        match scalar {
            // Strings render unquoted; tabs and newlines inside flow
            // through the layout engine.
            Scalar::Str(s) => Fmt::fg(self.palette.string, Fmt::text(s.clone())),
            Scalar::Integer(i) => {
                Fmt::fg(self.palette.number, Fmt::nobreak(Fmt::text(i.to_string())))
            }
            Scalar::Float(f) => Fmt::fg(
                self.palette.number,
                Fmt::nobreak(Fmt::text(format!("{f:?}"))),
            ),
            Scalar::Bool(b) => Fmt::fg(
                self.palette.keyword,
                Fmt::nobreak(Fmt::text(if *b { "true" } else { "false" })),
            ),
            Scalar::Null => Fmt::fg(self.palette.keyword, Fmt::nobreak(Fmt::text("null"))),
        }
    }
}

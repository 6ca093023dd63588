//! Minimal named-slot templates.
//!
//! A template is a format string such as `"Complex: {complex}\nSimple: {simple}"`.
//! `{name}` marks a slot; `{{` and `}}` produce literal braces. Slots must be
//! declared up front, and rendering fails when a declared slot that the
//! template uses has no value.

use crate::error::PromptError;
use crate::exemplar::FlattenedExemplar;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A parsed format string with a fixed set of named slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse `template`, accepting only the slot names in `slots`.
    pub fn new(template: impl Into<String>, slots: &[&str]) -> Result<Self, PromptError> {
        let source = template.into();
        let segments = parse(&source)?;

        for segment in &segments {
            if let Segment::Slot(name) = segment
                && !slots.contains(&name.as_str())
            {
                return Err(PromptError::Template(format!(
                    "'{source}' references undeclared slot '{name}' (declared: {})",
                    slots.join(", ")
                )));
            }
        }

        Ok(Self { source, segments })
    }

    /// The original format string.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// How many times `slot` appears in the template.
    pub fn occurrences(&self, slot: &str) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot(name) if name == slot))
            .count()
    }

    /// Substitute every slot with its value from `values`.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| PromptError::MissingSlot(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// The label written in front of each slot on its own line.
    ///
    /// For `"Complex: {complex}\nSimple: {simple}"` this yields
    /// `["Complex:", "Simple:"]`. Slots with nothing before them on their
    /// line contribute no label.
    pub fn slot_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        let mut previous: Option<&str> = None;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => previous = Some(text),
                Segment::Slot(_) => {
                    if let Some(text) = previous.take() {
                        let line = text.rsplit('\n').next().unwrap_or(text).trim();
                        if !line.is_empty() && !labels.iter().any(|l| l == line) {
                            labels.push(line.to_string());
                        }
                    }
                }
            }
        }
        labels
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, PromptError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(PromptError::Template(format!(
                                "unterminated slot in '{template}'"
                            )));
                        }
                        Some(ch) => name.push(ch),
                    }
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(PromptError::Template(format!("empty slot name in '{template}'")));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(name.to_string()));
            }
            '}' => {
                return Err(PromptError::Template(format!(
                    "unmatched '}}' in '{template}'"
                )));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Renders a flattened exemplar through a two-slot template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleTemplate {
    template: PromptTemplate,
    source_field: String,
    target_field: String,
}

impl ExampleTemplate {
    /// `template` may only reference `source_field` and `target_field`.
    pub fn new(
        template: impl Into<String>,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Result<Self, PromptError> {
        let source_field = source_field.into();
        let target_field = target_field.into();
        let template = PromptTemplate::new(template, &[&source_field, &target_field])?;
        Ok(Self {
            template,
            source_field,
            target_field,
        })
    }

    pub fn render(&self, exemplar: &FlattenedExemplar) -> Result<String, PromptError> {
        self.template.render(&[
            (&self.source_field, &exemplar.source),
            (&self.target_field, &exemplar.target),
        ])
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }
}

impl Default for ExampleTemplate {
    fn default() -> Self {
        Self {
            template: PromptTemplate {
                source: "Complex: {complex}\nSimple: {simple}".into(),
                segments: vec![
                    Segment::Literal("Complex: ".into()),
                    Segment::Slot("complex".into()),
                    Segment::Literal("\nSimple: ".into()),
                    Segment::Slot("simple".into()),
                ],
            },
            source_field: "complex".into(),
            target_field: "simple".into(),
        }
    }
}

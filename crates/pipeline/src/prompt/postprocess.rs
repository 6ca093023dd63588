//! Recovering a clean hypothesis from a raw model continuation.
//!
//! Generated text often echoes the prompt, runs on into another
//! demonstration, or repeats the numbered-reference format of the exemplars.
//! Each candidate goes through, in order:
//!
//! 1. removal of the first occurrence of the prompt, then trim
//! 2. truncation at the first example separator
//! 3. newlines replaced by spaces
//! 4. if a `<digit>:` marker is present, the first non-empty segment between markers
//! 5. removal of the template labels (`Complex:`, `Simple:`) and surrounding whitespace
//! 6. trim

use fewshot_core::{ExampleTemplate, PromptError};
use regex::Regex;
use tracing::info;

/// Labels stripped when the example template does not name any.
pub const DEFAULT_LABELS: [&str; 2] = ["Complex:", "Simple:"];

#[derive(Debug, Clone)]
pub struct Postprocessor {
    separator: String,
    enumeration: Regex,
    labels: Option<Regex>,
}

impl Postprocessor {
    pub fn new<S: AsRef<str>>(separator: impl Into<String>, labels: &[S]) -> Result<Self, PromptError> {
        let enumeration = Regex::new(r"\d:")
            .map_err(|e| PromptError::InvalidArgument(format!("enumeration pattern: {e}")))?;

        let alternatives: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref().trim())
            .filter(|l| !l.is_empty())
            .map(regex::escape)
            .collect();
        let labels = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!(r"\s*(?:{})\s*", alternatives.join("|"));
            Some(Regex::new(&pattern).map_err(|e| {
                PromptError::InvalidArgument(format!("label pattern '{pattern}': {e}"))
            })?)
        };

        Ok(Self {
            separator: separator.into(),
            enumeration,
            labels,
        })
    }

    /// Strip the labels the example template puts before its slots, or
    /// [`DEFAULT_LABELS`] when it has none.
    pub fn for_template(
        separator: impl Into<String>,
        template: &ExampleTemplate,
    ) -> Result<Self, PromptError> {
        let labels = template.template().slot_labels();
        if labels.is_empty() {
            Self::new(separator, DEFAULT_LABELS.as_slice())
        } else {
            Self::new(separator, labels.as_slice())
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Clean a single candidate produced for `prompt`.
    pub fn clean(&self, prompt: &str, candidate: &str) -> String {
        let without_echo = if prompt.is_empty() {
            candidate.to_string()
        } else {
            candidate.replacen(prompt, "", 1)
        };
        let text = without_echo.trim();

        let text = match (!self.separator.is_empty())
            .then(|| text.split_once(self.separator.as_str()))
            .flatten()
        {
            Some((head, _)) => head,
            None => {
                info!(
                    "No separator in model output; it may be complete or cut short by max_new_tokens"
                );
                text
            }
        };

        let text = text.replace('\n', " ");

        let text = if self.enumeration.is_match(&text) {
            self.enumeration
                .split(&text)
                .map(str::trim)
                .find(|segment| !segment.is_empty())
                .unwrap_or_default()
                .to_string()
        } else {
            text
        };

        let text = match &self.labels {
            Some(labels) => labels.replace_all(&text, "").into_owned(),
            None => text,
        };

        text.trim().to_string()
    }

    /// Clean every candidate of every prompt. `outputs[i]` holds the
    /// candidates generated for `prompts[i]`.
    pub fn postprocess<S: AsRef<str>>(
        &self,
        prompts: &[S],
        outputs: &[Vec<String>],
    ) -> Result<Vec<Vec<String>>, PromptError> {
        if prompts.len() != outputs.len() {
            return Err(PromptError::InvalidArgument(format!(
                "got {} prompts but {} output lists",
                prompts.len(),
                outputs.len()
            )));
        }
        Ok(prompts
            .iter()
            .zip(outputs)
            .map(|(prompt, candidates)| {
                candidates
                    .iter()
                    .map(|candidate| self.clean(prompt.as_ref(), candidate))
                    .collect()
            })
            .collect())
    }
}

/// Clean raw outputs with the default labels.
pub fn postprocess<S: AsRef<str>>(
    prompts: &[S],
    raw_outputs: &[Vec<String>],
    separator: &str,
) -> Result<Vec<Vec<String>>, PromptError> {
    Postprocessor::new(separator, DEFAULT_LABELS.as_slice())?.postprocess(prompts, raw_outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp() -> Postprocessor {
        Postprocessor::new("\n\n", DEFAULT_LABELS.as_slice()).unwrap()
    }

    #[test]
    fn echo_separator_and_label_are_removed() {
        let out = postprocess(
            &["P1"],
            &[vec!["P1 Simple: Hello world.\n\nComplex: next".to_string()]],
            "\n\n",
        )
        .unwrap();
        assert_eq!(out, vec![vec!["Hello world.".to_string()]]);
    }

    #[test]
    fn enumeration_keeps_first_option() {
        assert_eq!(
            pp().clean("prompt", "0: First option. 1: Second option."),
            "First option."
        );
    }

    #[test]
    fn continuation_only_output_is_untouched_by_echo_removal() {
        assert_eq!(pp().clean("Complex: A.\nSimple:", " The cat sat."), "The cat sat.");
    }

    #[test]
    fn only_first_echo_is_removed() {
        assert_eq!(pp().clean("ab", "ab ab"), "ab");
    }

    #[test]
    fn missing_separator_keeps_everything() {
        assert_eq!(pp().clean("", "one line\nsecond line"), "one line second line");
    }

    #[test]
    fn all_empty_enumeration_segments_yield_empty() {
        assert_eq!(pp().clean("", "1: 2:"), "");
    }

    #[test]
    fn labels_removed_anywhere() {
        assert_eq!(pp().clean("", "Simple:   It rains."), "It rains.");
        assert_eq!(pp().clean("", "It rains. Complex:"), "It rains.");
    }

    #[test]
    fn custom_labels_from_template() {
        let template = ExampleTemplate::new("Source: {src}\nTarget: {tgt}", "src", "tgt").unwrap();
        let pp = Postprocessor::for_template("###", &template).unwrap();
        assert_eq!(pp.clean("", "Target: Short. ### Source: more"), "Short.");
        // Default labels are not stripped when the template names its own.
        assert_eq!(pp.clean("", "Simple: kept"), "Simple: kept");
    }

    #[test]
    fn unlabelled_template_falls_back_to_defaults() {
        let template = ExampleTemplate::new("{src}\n{tgt}", "src", "tgt").unwrap();
        let pp = Postprocessor::for_template("\n\n", &template).unwrap();
        assert_eq!(pp.clean("", "Simple: text"), "text");
    }

    #[test]
    fn output_shape_mirrors_input() {
        let prompts = ["a", "b"];
        let outputs = vec![
            vec!["x".to_string(), "y".to_string(), "z".to_string()],
            vec!["w".to_string()],
        ];
        let cleaned = pp().postprocess(&prompts, &outputs).unwrap();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].len(), 3);
        assert_eq!(cleaned[1].len(), 1);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = pp().postprocess(&["a", "b"], &[vec![]]).unwrap_err();
        assert!(matches!(err, PromptError::InvalidArgument(_)));
    }
}

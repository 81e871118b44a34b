use crate::constants::DEFAULT_PALETTE;

use std::collections::HashMap;

/// Substitution table from raw hex colors to the refined palette.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    substitutions: HashMap<String, String>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new(DEFAULT_PALETTE)
    }
}

impl Palette {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let substitutions = pairs
            .into_iter()
            .map(|(from, to)| (from.to_ascii_lowercase(), to.to_string()))
            .collect();

        Palette { substitutions }
    }

    pub fn empty() -> Self {
        Palette {
            substitutions: HashMap::new(),
        }
    }

    pub fn with(mut self, from: &str, to: &str) -> Self {
        self.substitutions
            .insert(from.to_ascii_lowercase(), to.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.substitutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }

    pub fn apply(&self, markup: &str) -> String {
        self.apply_counted(markup).0
    }

    /// Replaces whole `#hex` tokens in one left-to-right pass, so a
    /// replacement is never rewritten again by a later entry.
    pub fn apply_counted(&self, markup: &str) -> (String, usize) {
        let mut output = String::with_capacity(markup.len());
        let mut replaced = 0;
        let mut rest = markup;

        while let Some(index) = rest.find('#') {
            let (before, from_hash) = rest.split_at(index);
            output.push_str(before);

            let digits = from_hash[1..]
                .find(|c: char| !c.is_ascii_hexdigit())
                .unwrap_or(from_hash.len() - 1);
            let (token, after) = from_hash.split_at(digits + 1);

            // `&#123;` is a character reference, not a color
            let substitution = match before.ends_with('&') {
                true => None,
                false => self.substitutions.get(&token.to_ascii_lowercase()),
            };

            match substitution {
                Some(color) => {
                    output.push_str(color);
                    replaced += 1;
                }
                None => output.push_str(token),
            }

            rest = after;
        }

        output.push_str(rest);

        (output, replaced)
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright Krouter Authors

//! Line-oriented builder for FRR configuration snippets.

use std::fmt::Display;
use std::ops::AddAssign;

/// Section separator line.
pub const MARKER: &str = "!";

/// Something that renders itself into FRR configuration, given some
/// context (typically the enclosing BGP identity).
pub trait Render {
    type Context;
    type Output;

    fn render(&self, ctx: &Self::Context) -> Self::Output;
}

/// An appendable list of configuration lines.
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    lines: Vec<String>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl AddAssign<&str> for ConfigBuilder {
    fn add_assign(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

impl AddAssign<String> for ConfigBuilder {
    fn add_assign(&mut self, line: String) {
        self.lines.push(line);
    }
}

impl AddAssign<ConfigBuilder> for ConfigBuilder {
    fn add_assign(&mut self, other: ConfigBuilder) {
        self.lines.extend(other.lines);
    }
}

impl Display for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

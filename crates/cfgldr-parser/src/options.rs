//! Parse options.

/// How key and section names are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Names are `[A-Za-z0-9_.-]+`
    #[default]
    Config,
    /// Names are any run of non-whitespace, since they are regular
    /// expressions; the assignment operator must be preceded by whitespace
    Schema,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub mode: Mode,
}

impl ParseOptions {
    pub fn config() -> Self {
        ParseOptions { mode: Mode::Config }
    }

    pub fn schema() -> Self {
        ParseOptions { mode: Mode::Schema }
    }
}

pub mod ast;
pub mod builtins;
pub mod driver;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod translator;

pub use error::{TranslateError, TranslateResult};
pub use translator::{Translator, TranslatorOptions};

/// Translates Python source into C with the default options.
pub fn translate(source: &str) -> TranslateResult<String> {
    Translator::default().translate_source(source)
}

use std::fmt::Write;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::{debug, warn};

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hljs-" };

/// Themes used for the `prefers-color-scheme` variants of the code CSS.
const THEMES: [(&str, &str); 2] = [("light", "InspiredGitHub"), ("dark", "base16-ocean.dark")];

/// Class based code highlighter. Loading the syntax definitions is slow, so
/// one instance is built at startup and shared.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    css: String,
}

impl Highlighter {
    pub fn new() -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let themes = ThemeSet::load_defaults();

        let mut css = String::new();
        for (scheme, name) in THEMES {
            let Some(theme) = themes.themes.get(name) else {
                warn!("highlight theme {} missing", name);
                continue;
            };
            match css_for_theme_with_class_style(theme, CLASS_STYLE) {
                Ok(rules) => {
                    let _ = writeln!(css, "@media (prefers-color-scheme: {scheme}) {{\n{rules}}}");
                }
                Err(err) => warn!("failed to build css for theme {}: {}", name, err),
            }
        }

        Self { syntax_set, css }
    }

    /// Stylesheet for the highlighted spans, light and dark.
    pub fn css(&self) -> &str {
        &self.css
    }

    /// Inner HTML of a `<code>` element. Never fails: unknown languages and
    /// highlighter errors fall back to escaped text.
    pub fn highlight(&self, code: &str, language: Option<&str>) -> String {
        let Some(language) = language.map(str::trim).filter(|l| !l.is_empty()) else {
            return html_escape::encode_text(code).into_owned();
        };

        let syntax = self
            .syntax_set
            .find_syntax_by_token(language)
            .or_else(|| self.syntax_set.find_syntax_by_extension(language));
        let Some(syntax) = syntax else {
            return html_escape::encode_text(code).into_owned();
        };

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, CLASS_STYLE);
        for line in LinesWithEndings::from(code) {
            if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
                debug!("highlighting {} failed: {}", language, err);
                return html_escape::encode_text(code).into_owned();
            }
        }
        generator.finalize()
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_gets_spans() {
        let h = Highlighter::new();
        let html = h.highlight("fn main() {}\n", Some("rust"));
        assert!(html.contains("<span class=\"hljs-"), "{html}");
        assert!(html.contains("main"));
    }

    #[test]
    fn unknown_language_is_escaped_text() {
        let h = Highlighter::new();
        assert_eq!(
            h.highlight("<b>&</b>", Some("no-such-lang")),
            "&lt;b&gt;&amp;&lt;/b&gt;"
        );
        assert_eq!(h.highlight("a < b", None), "a &lt; b");
    }

    #[test]
    fn css_has_both_schemes() {
        let h = Highlighter::new();
        assert!(h.css().contains("prefers-color-scheme: light"));
        assert!(h.css().contains("prefers-color-scheme: dark"));
    }
}

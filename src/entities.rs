/// Decodes HTML character entities in feed text before it is handed to the
/// Markdown renderer.
pub trait EntityDecoder: Send + Sync {
    fn decode(&self, text: &str) -> String;
}

/// Decodes the five entities the feed API emits. `&amp;` goes last so that
/// `&amp;lt;` becomes `&lt;` and not `<`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicEntityDecoder;

impl EntityDecoder for BasicEntityDecoder {
    fn decode(&self, text: &str) -> String {
        text.replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    }
}

/// Full HTML entity decoding, named and numeric.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullEntityDecoder;

impl EntityDecoder for FullEntityDecoder {
    fn decode(&self, text: &str) -> String {
        html_escape::decode_html_entities(text).into_owned()
    }
}

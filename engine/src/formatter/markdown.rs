//! Markdown to HTML, available with the `markdown` feature.

#[cfg(feature = "markdown")]
pub fn to_html(text: &str, _warn: &mut dyn FnMut(String)) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(text, options));
    out.trim_end().to_string()
}

#[cfg(not(feature = "markdown"))]
pub fn to_html(text: &str, warn: &mut dyn FnMut(String)) -> String {
    warn("Markdown support is not compiled in, text is kept as is".to_string());
    text.to_string()
}

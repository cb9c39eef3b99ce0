use ammonia;

/// Clean user-authored text using the ammonia library.
///
/// Question prompts and option texts are written by teachers and rendered
/// to students, so they pass through whitelist-based sanitization on
/// intake: safe tags (like <b>, <p>) survive, dangerous tags (like
/// <script>, <iframe>) and attributes (like onclick) are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

// src/utils/html.rs

/// Cleans teacher-supplied rich text with a whitelist sanitizer.
///
/// Safe formatting tags (<b>, <p>, lists) survive; <script>, <iframe> and
/// event-handler attributes are stripped together with script bodies.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

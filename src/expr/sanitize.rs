/// Characters the expression grammar does not accept inside placeholder names.
pub const FORBIDDEN_PLACEHOLDER_CHARS: &[char] = &[
    '{', '}', '[', ']', '/', '?', '.', ',', ';', ':', '|', ')', '*', '~', '`', '!', '^', '-', '_',
    '+', '<', '>', '@', '#', '$', '%', '&', '\\', '=', '(', '\'', '"',
];

/// Strip everything that cannot appear after `#` or `:` in a placeholder.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !FORBIDDEN_PLACEHOLDER_CHARS.contains(c))
        .collect()
}

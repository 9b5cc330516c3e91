//! Glob patterns compiled to anchored regular expressions
//!
//! Supported syntax: `**` (any depth, including none), `*` (within one path
//! segment), `?` (one character within a segment). Everything else matches
//! literally. Paths are compared with `/` separators.

use regex::Regex;

use crate::AssetError;

/// Translate a glob into regex source, anchored at both ends
pub fn glob_to_regex_source(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // `**/` also matches zero directories
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
                i += 1;
            }
        }
    }

    out.push('$');
    out
}

/// Compiled glob
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, AssetError> {
        let regex = Regex::new(&glob_to_regex_source(pattern)).map_err(|e| AssetError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a relative path; backslashes are treated as separators
    pub fn is_match(&self, path: &str) -> bool {
        if path.contains('\\') {
            self.regex.is_match(&path.replace('\\', "/"))
        } else {
            self.regex.is_match(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        Glob::new(pattern).unwrap().is_match(path)
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("*.jpg", "a.jpg"));
        assert!(!matches("*.jpg", "dir/a.jpg"));
        assert!(!matches("*.jpg", "a.png"));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        assert!(matches("**/*.jpg", "a.jpg"));
        assert!(matches("**/*.jpg", "x/y/a.jpg"));
        assert!(matches("photos/**", "photos/x/y.png"));
        assert!(!matches("photos/**", "other/y.png"));
    }

    #[test]
    fn test_question_mark_and_literals() {
        assert!(matches("img?.png", "img1.png"));
        assert!(!matches("img?.png", "img12.png"));
        assert!(!matches("img?.png", "img/.png"));
        // `.` and `+` are literal
        assert!(matches("a+b.txt", "a+b.txt"));
        assert!(!matches("a.txt", "abtxt"));
    }

    #[test]
    fn test_windows_separators() {
        assert!(matches("**/*.jpg", "x\\a.jpg"));
    }
}

//! File naming convention for versions and publish elements
//!
//! ```text
//! hero_model_v003.ma               work version 3
//! publish/v002/                    publish version 2
//! publish/v002/hero_model_v002_usd.usda   "usd" element of publish version 2
//! ```
//!
//! Numbers are zero padded for readability but parsed from any digit count,
//! so ordering by the parsed number stays correct past the padding width.

use std::cmp::Ordering;

/// Default zero padding width of version numbers
pub const DEFAULT_PADDING: usize = 3;

/// Components recovered from a versioned file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub number: u64,
    pub element: Option<String>,
    pub extension: Option<String>,
}

/// Formatting and parsing of versioned names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingConvention {
    padding: usize,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

impl NamingConvention {
    pub fn new(padding: usize) -> Self {
        Self {
            padding: padding.max(1),
        }
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// `v003`
    pub fn version_tag(&self, number: u64) -> String {
        format!("v{:0width$}", number, width = self.padding)
    }

    /// `hero_model_v003.ma`; `extension` may be given with or without the dot
    pub fn version_file(&self, work: &str, number: u64, extension: Option<&str>) -> String {
        let mut name = format!("{}_{}", work, self.version_tag(number));
        push_extension(&mut name, extension);
        name
    }

    /// `hero_model_v002_usd.usda`
    pub fn element_file(
        &self,
        work: &str,
        number: u64,
        element: &str,
        extension: Option<&str>,
    ) -> String {
        let mut name = format!("{}_{}_{}", work, self.version_tag(number), element);
        push_extension(&mut name, extension);
        name
    }

    /// `hero_model_v003.json`, the sidecar record of a version
    pub fn record_file(&self, work: &str, number: u64) -> String {
        self.version_file(work, number, Some("json"))
    }

    /// Parse `v003` (a publish version directory)
    pub fn parse_version_tag(&self, name: &str) -> Option<u64> {
        let digits = name.strip_prefix('v')?;
        parse_digits(digits)
    }

    /// Parse a work version file or publish element file belonging to `work`
    pub fn parse_file(&self, work: &str, file_name: &str) -> Option<ParsedName> {
        let rest = file_name.strip_prefix(work)?.strip_prefix("_v")?;
        let digit_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let number = parse_digits(&rest[..digit_end])?;
        let mut tail = &rest[digit_end..];

        let mut element = None;
        if let Some(after) = tail.strip_prefix('_') {
            let end = after.find('.').unwrap_or(after.len());
            if end == 0 {
                return None;
            }
            element = Some(after[..end].to_string());
            tail = &after[end..];
        }

        let extension = match tail {
            "" => None,
            ext => Some(ext.strip_prefix('.')?.to_string()).filter(|ext| !ext.is_empty()),
        };

        Some(ParsedName {
            number,
            element,
            extension,
        })
    }

    /// Order two file names by embedded version number, then by name
    pub fn compare(&self, work: &str, a: &str, b: &str) -> Ordering {
        let number = |name: &str| self.parse_file(work, name).map(|parsed| parsed.number);
        number(a).cmp(&number(b)).then_with(|| a.cmp(b))
    }
}

fn parse_digits(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().filter(|number| *number > 0)
}

fn push_extension(name: &mut String, extension: Option<&str>) {
    if let Some(ext) = extension.map(|ext| ext.trim_start_matches('.')) {
        if !ext.is_empty() {
            name.push('.');
            name.push_str(ext);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_file_format() {
        let naming = NamingConvention::default();
        assert_eq!(naming.version_file("hero_model", 3, Some(".ma")), "hero_model_v003.ma");
        assert_eq!(naming.version_file("hero_model", 3, Some("ma")), "hero_model_v003.ma");
        assert_eq!(naming.version_file("hero_model", 1200, None), "hero_model_v1200");
        assert_eq!(
            naming.element_file("hero_model", 2, "usd", Some("usda")),
            "hero_model_v002_usd.usda"
        );
    }

    #[test]
    fn test_parse_work_file() {
        let naming = NamingConvention::default();
        let parsed = naming.parse_file("hero_model", "hero_model_v003.ma").unwrap();
        assert_eq!(parsed.number, 3);
        assert_eq!(parsed.element, None);
        assert_eq!(parsed.extension.as_deref(), Some("ma"));
    }

    #[test]
    fn test_parse_element_file() {
        let naming = NamingConvention::default();
        let parsed = naming
            .parse_file("hero_model", "hero_model_v002_usd_lop.usda")
            .unwrap();
        assert_eq!(parsed.number, 2);
        assert_eq!(parsed.element.as_deref(), Some("usd_lop"));
        assert_eq!(parsed.extension.as_deref(), Some("usda"));
    }

    #[test]
    fn test_rejects_foreign_names() {
        let naming = NamingConvention::default();
        assert_eq!(naming.parse_file("hero_model", "villain_v001.ma"), None);
        assert_eq!(naming.parse_file("hero_model", "hero_model_final.ma"), None);
        assert_eq!(naming.parse_file("hero_model", "hero_model_v000.ma"), None);
        assert_eq!(naming.parse_file("hero_model", "hero_model_v001_.ma"), None);
        assert_eq!(naming.parse_version_tag("v012"), Some(12));
        assert_eq!(naming.parse_version_tag("va12"), None);
    }

    #[test]
    fn test_numeric_ordering_beyond_padding() {
        let naming = NamingConvention::default();
        let mut names = vec!["hero_v1000.ma", "hero_v999.ma", "hero_v010.ma"];
        names.sort_by(|a, b| naming.compare("hero", a, b));
        assert_eq!(names, vec!["hero_v010.ma", "hero_v999.ma", "hero_v1000.ma"]);
    }
}

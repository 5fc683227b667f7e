// aurs-common/src/model/version.rs
//! pacman-compatible version ordering and dependency constraints.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Compares two `[epoch:]pkgver[-pkgrel]` strings the way `vercmp(8)` does.
///
/// The release is only compared when both sides carry one, so `1.0` and
/// `1.0-3` compare equal.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    let mut ordering = rpmvercmp(epoch_a, epoch_b);
    if ordering == Ordering::Equal {
        ordering = rpmvercmp(ver_a, ver_b);
        if ordering == Ordering::Equal {
            if let (Some(rel_a), Some(rel_b)) = (rel_a, rel_b) {
                ordering = rpmvercmp(rel_a, rel_b);
            }
        }
    }
    ordering
}

fn split_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits_end = evr
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(evr.len());

    let (epoch, rest) = if evr[digits_end..].starts_with(':') {
        let epoch = &evr[..digits_end];
        (if epoch.is_empty() { "0" } else { epoch }, &evr[digits_end + 1..])
    } else {
        ("0", evr)
    };

    match rest.rfind('-') {
        Some(idx) => (epoch, &rest[..idx], Some(&rest[idx + 1..])),
        None => (epoch, rest, None),
    }
}

fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    let (mut end_one, mut end_two) = (0usize, 0usize);

    while i < one.len() && j < two.len() {
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= one.len() || j >= two.len() {
            break;
        }

        // Separator runs of different length decide on their own.
        let sep_one = i - end_one;
        let sep_two = j - end_two;
        if sep_one != sep_two {
            return sep_one.cmp(&sep_two);
        }

        end_one = i;
        end_two = j;
        let numeric = one[i].is_ascii_digit();
        if numeric {
            while end_one < one.len() && one[end_one].is_ascii_digit() {
                end_one += 1;
            }
            while end_two < two.len() && two[end_two].is_ascii_digit() {
                end_two += 1;
            }
        } else {
            while end_one < one.len() && one[end_one].is_ascii_alphabetic() {
                end_one += 1;
            }
            while end_two < two.len() && two[end_two].is_ascii_alphabetic() {
                end_two += 1;
            }
        }

        // Segment types differ: numeric always ranks above alpha.
        if end_two == j {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_one = &one[i..end_one];
        let mut seg_two = &two[j..end_two];
        if numeric {
            seg_one = strip_leading_zeros(seg_one);
            seg_two = strip_leading_zeros(seg_two);
            if seg_one.len() != seg_two.len() {
                return seg_one.len().cmp(&seg_two.len());
            }
        }
        match seg_one.cmp(seg_two) {
            Ordering::Equal => {}
            other => return other,
        }

        i = end_one;
        j = end_two;
    }

    let one_done = i >= one.len();
    let two_done = j >= two.len();
    if one_done && two_done {
        return Ordering::Equal;
    }

    // The side with a trailing alpha segment is the older one, e.g. 1.0a < 1.0.
    let one_alpha = !one_done && one[i].is_ascii_alphabetic();
    let two_alpha = !two_done && two[j].is_ascii_alphabetic();
    if (one_done && !two_alpha) || one_alpha {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn strip_leading_zeros(segment: &[u8]) -> &[u8] {
    let first = segment
        .iter()
        .position(|&b| b != b'0')
        .unwrap_or(segment.len());
    &segment[first..]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VersionOperator {
    #[default]
    Any,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl VersionOperator {
    /// Operators in the order they are searched for in a dependency line.
    const PARSE_ORDER: [(&'static str, VersionOperator); 5] = [
        (">=", VersionOperator::Ge),
        ("<=", VersionOperator::Le),
        ("=", VersionOperator::Eq),
        (">", VersionOperator::Gt),
        ("<", VersionOperator::Lt),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOperator::Any => "",
            VersionOperator::Eq => "=",
            VersionOperator::Lt => "<",
            VersionOperator::Le => "<=",
            VersionOperator::Gt => ">",
            VersionOperator::Ge => ">=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            VersionOperator::Any => true,
            VersionOperator::Eq => ordering == Ordering::Equal,
            VersionOperator::Lt => ordering == Ordering::Less,
            VersionOperator::Le => ordering != Ordering::Greater,
            VersionOperator::Gt => ordering == Ordering::Greater,
            VersionOperator::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for VersionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits `foo>=1.2-3` into `("foo", Ge, Some("1.2-3"))`.
///
/// An `optdepends` style description (`foo: does things`) is dropped first.
pub fn split_dependency_line(line: &str) -> (&str, VersionOperator, Option<&str>) {
    let line = match line.split_once(": ") {
        Some((head, _description)) => head,
        None => line.strip_suffix(':').unwrap_or(line),
    }
    .trim();

    for (token, operator) in VersionOperator::PARSE_ORDER {
        if let Some(idx) = line.find(token) {
            let name = line[..idx].trim();
            let version = line[idx + token.len()..].trim();
            return (name, operator, Some(version));
        }
    }
    (line, VersionOperator::Any, None)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionConstraint {
    pub operator: VersionOperator,
    pub version: String,
}

impl VersionConstraint {
    pub fn is_satisfied_by(&self, candidate: &str) -> bool {
        self.operator.accepts(vercmp(candidate, &self.version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// A set of constraints on one package name, satisfied only when all hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMatcher {
    pub package_name: String,
    /// Every dependency line folded into this matcher, for diagnostics.
    pub lines: Vec<String>,
    constraints: Vec<VersionConstraint>,
}

impl VersionMatcher {
    pub fn parse(line: &str) -> Self {
        let (name, operator, version) = split_dependency_line(line);
        let constraints = match (operator, version) {
            (VersionOperator::Any, _) | (_, None) => Vec::new(),
            (operator, Some(version)) => vec![VersionConstraint {
                operator,
                version: version.to_string(),
            }],
        };
        Self {
            package_name: name.to_string(),
            lines: vec![line.trim().to_string()],
            constraints,
        }
    }

    pub fn any(name: &str) -> Self {
        Self {
            package_name: name.to_string(),
            lines: vec![name.to_string()],
            constraints: Vec::new(),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied_by(candidate))
    }

    /// Folds another matcher for the same name into this one (logical AND).
    pub fn combine(&mut self, other: &VersionMatcher) {
        for constraint in &other.constraints {
            if !self.constraints.contains(constraint) {
                self.constraints.push(constraint.clone());
            }
        }
        for line in &other.lines {
            if !self.lines.contains(line) {
                self.lines.push(line.clone());
            }
        }
    }

    pub fn combined(mut self, other: &VersionMatcher) -> Self {
        self.combine(other);
        self
    }

    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Human readable form of every folded line, e.g. `foo>=1, foo<2`.
    pub fn line(&self) -> String {
        self.lines.join(", ")
    }
}

impl fmt::Display for VersionMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.package_name)?;
        let rendered: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        if !rendered.is_empty() {
            write!(f, "{}", rendered.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vercmp_basic_ordering() {
        assert_eq!(vercmp("1.5.0", "1.5.0"), Ordering::Equal);
        assert_eq!(vercmp("1.5.1", "1.5.0"), Ordering::Greater);
        assert_eq!(vercmp("1.5.0-1", "1.5.0-2"), Ordering::Less);
        assert_eq!(vercmp("1.5.0-1", "1.5.1-1"), Ordering::Less);
        assert_eq!(vercmp("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(vercmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(vercmp("1.010", "1.10"), Ordering::Equal);
    }

    #[test]
    fn test_vercmp_alpha_segments() {
        assert_eq!(vercmp("1.0a", "1.0"), Ordering::Less);
        assert_eq!(vercmp("1.0a", "1.0b"), Ordering::Less);
        assert_eq!(vercmp("1.0b", "1.0beta"), Ordering::Less);
        assert_eq!(vercmp("1.0rc", "1.0"), Ordering::Less);
        assert_eq!(vercmp("1.1", "1.a"), Ordering::Greater);
    }

    #[test]
    fn test_vercmp_epoch_and_release() {
        assert_eq!(vercmp("1:1.0", "2.0"), Ordering::Greater);
        assert_eq!(vercmp("0:1.0", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1.0-1", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1.1-1", "1.1-1.1"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_git_style_chain() {
        assert_eq!(vercmp("0.50.1", "0.50.2-1"), Ordering::Less);
        assert_eq!(vercmp("0.50.2-1", "0.50.2+6+123131-1"), Ordering::Less);
        assert_eq!(vercmp("0.50.1", "0.50.2+6+123131-1"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_is_a_total_order_on_samples() {
        let samples = [
            "1.0", "1.0a", "1.0.1", "1:0.1", "2.0-1", "2.0-2", "0.50.2+6+123131-1", "1.0rc1",
            "1.0.0", "r123.abcdef",
        ];
        for a in samples {
            assert_eq!(vercmp(a, a), Ordering::Equal);
            for b in samples {
                assert_eq!(vercmp(a, b), vercmp(b, a).reverse(), "{a} vs {b}");
                for c in samples {
                    if vercmp(a, b) == Ordering::Less && vercmp(b, c) == Ordering::Less {
                        assert_eq!(vercmp(a, c), Ordering::Less, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_split_dependency_line_operator_priority() {
        assert_eq!(
            split_dependency_line("foo>=1.2-3"),
            ("foo", VersionOperator::Ge, Some("1.2-3"))
        );
        assert_eq!(
            split_dependency_line("foo<=2"),
            ("foo", VersionOperator::Le, Some("2"))
        );
        assert_eq!(
            split_dependency_line("foo=1"),
            ("foo", VersionOperator::Eq, Some("1"))
        );
        assert_eq!(
            split_dependency_line("foo>1"),
            ("foo", VersionOperator::Gt, Some("1"))
        );
        assert_eq!(
            split_dependency_line("foo<1"),
            ("foo", VersionOperator::Lt, Some("1"))
        );
        assert_eq!(split_dependency_line("foo"), ("foo", VersionOperator::Any, None));
        assert_eq!(
            split_dependency_line("python-foo: for the plugin"),
            ("python-foo", VersionOperator::Any, None)
        );
    }

    #[test]
    fn test_eq_constraint_ignores_missing_release() {
        let matcher = VersionMatcher::parse("foo=1.0");
        assert!(matcher.matches("1.0-3"));
        assert!(!matcher.matches("1.1-1"));
    }

    #[test]
    fn test_any_matcher_accepts_everything() {
        let matcher = VersionMatcher::parse("foo");
        assert!(matcher.is_any());
        assert!(matcher.matches("0"));
        assert!(matcher.matches("9:9.9"));
    }

    #[test]
    fn test_combined_matcher_is_order_independent() {
        let lower = VersionMatcher::parse("foo>=1.0");
        let upper = VersionMatcher::parse("foo<2.0");
        let ab = lower.clone().combined(&upper);
        let ba = upper.combined(&lower);
        for candidate in ["0.9", "1.0", "1.5-2", "2.0", "3"] {
            assert_eq!(ab.matches(candidate), ba.matches(candidate), "{candidate}");
        }
        assert!(ab.matches("1.5-2"));
        assert!(!ab.matches("2.0"));
        assert!(!ab.matches("0.9"));
    }

    #[test]
    fn test_combine_never_relaxes() {
        let mut matcher = VersionMatcher::parse("foo>=2");
        matcher.combine(&VersionMatcher::parse("foo"));
        assert!(!matcher.matches("1.0"));
        assert_eq!(matcher.line(), "foo>=2, foo");
    }
}
